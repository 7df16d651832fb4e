use sea_orm::{ColumnTrait, Value};
use std::collections::BTreeMap;

use crate::error::{ApiError, Result};

/// Field-name to new-value map for partial updates.
///
/// Only the named columns are written, so fields absent from a PATCH body keep
/// their stored values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet(BTreeMap<String, Value>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Set `field` only when `value` is present.
    pub fn set_opt<V: Into<Value>>(&mut self, field: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(field, value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Resolve field names to columns, rejecting anything outside `updatable`.
    pub fn resolve<C: ColumnTrait>(&self, updatable: &[&str]) -> Result<Vec<(C, Value)>> {
        if self.is_empty() {
            return Err(ApiError::validation("at least one field must be provided"));
        }

        self.0
            .iter()
            .map(|(field, value)| {
                if !updatable.contains(&field.as_str()) {
                    return Err(ApiError::BadRequest(format!(
                        "field '{}' cannot be updated",
                        field
                    )));
                }
                let column = C::from_str(field)
                    .map_err(|_| ApiError::BadRequest(format!("unknown field '{}'", field)))?;
                Ok((column, value.clone()))
            })
            .collect()
    }
}
