use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Envelope metadata. Always carries `status`, plus optional extras such as `total`.
pub type Meta = Map<String, Value>;

/// Success envelope: `{ "meta": {...}, "data": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        let mut meta = Meta::new();
        meta.insert("status".into(), status.as_u16().into());
        Self {
            status,
            meta,
            data: Some(data),
        }
    }

    pub fn ok(data: T) -> Self {
        Self::new(StatusCode::OK, data)
    }

    pub fn created(data: T) -> Self {
        Self::new(StatusCode::CREATED, data)
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }
}

impl ApiResponse<()> {
    /// Data-less envelope with a `meta.message`, used for delete confirmations
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        let mut meta = Meta::new();
        meta.insert("status".into(), status.as_u16().into());
        meta.insert("message".into(), Value::String(message.into()));
        Self {
            status,
            meta,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Error envelope: `{ "meta": { "status" }, "error": { code, message, details? } }`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub meta: ErrorMeta,
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorMeta {
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> Self {
        Self {
            meta: ErrorMeta {
                status: status.as_u16(),
            },
            error: ErrorObject {
                code: code.into(),
                message: message.into(),
                details,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
