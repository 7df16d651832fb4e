// Service modules
pub mod changes;
pub mod health_service;
pub mod jwt_service;
pub mod task_service;
pub mod todo_service;

pub use changes::ChangeSet;
pub use health_service::HealthService;
pub use jwt_service::JWTService;
pub use task_service::{NewTask, TaskService};
pub use todo_service::TodoService;
