use serde::Deserialize;
use validator::Validate;

use crate::services::ChangeSet;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTodoRequest {
    #[validate(required, length(min = 1))]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTodoRequest {
    #[validate(length(min = 1))]
    pub text: Option<String>,
}

impl From<UpdateTodoRequest> for ChangeSet {
    fn from(request: UpdateTodoRequest) -> Self {
        let mut changes = ChangeSet::new();
        changes.set_opt("text", request.text);
        changes
    }
}
