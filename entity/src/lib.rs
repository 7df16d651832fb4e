pub mod prelude;

pub mod tasks;
pub mod todos;
pub mod users;
