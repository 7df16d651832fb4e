use serde::Deserialize;
use validator::Validate;

use crate::services::{ChangeSet, NewTask};

/// Request body for creating a task
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(required, length(min = 1))]
    pub description: Option<String>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(request: CreateTaskRequest) -> Self {
        NewTask {
            description: request.description.unwrap_or_default(),
        }
    }
}

/// Request body for a partial task update; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1))]
    pub description: Option<String>,
}

impl From<UpdateTaskRequest> for ChangeSet {
    fn from(request: UpdateTaskRequest) -> Self {
        let mut changes = ChangeSet::new();
        changes.set_opt("description", request.description);
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_description_fails_validation() {
        let request: CreateTaskRequest = serde_json::from_str("{}").unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("description"));
    }

    #[test]
    fn test_empty_patch_yields_empty_change_set() {
        let request: UpdateTaskRequest = serde_json::from_str("{}").unwrap();
        assert!(request.validate().is_ok());
        assert!(ChangeSet::from(request).is_empty());
    }
}
