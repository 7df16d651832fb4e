// Request/Response models
pub mod common;
pub mod health;
pub mod task;
pub mod todo;
