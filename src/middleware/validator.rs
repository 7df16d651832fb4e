//! Request validation context: the caller's locale, a validating JSON
//! extractor and path id checks, all reporting `validation_failed` with
//! per-field messages in the caller's language.

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::ACCEPT_LANGUAGE, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, convert::Infallible};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::ApiError;

/// Language used for validation messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestLocale {
    #[default]
    En,
    Id,
}

impl RequestLocale {
    /// Primary tag of the first Accept-Language preference; anything other
    /// than Indonesian falls back to English.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()) else {
            return Self::En;
        };

        let first = value.split(',').next().unwrap_or_default();
        let tag = first.split(';').next().unwrap_or_default();
        let primary = tag.split('-').next().unwrap_or_default().trim();

        match primary.to_lowercase().as_str() {
            "id" | "in" => Self::Id,
            _ => Self::En,
        }
    }

    fn message(self, error: &ValidationError) -> String {
        let param = |name: &str| error.params.get(name).map(|v| v.to_string());

        match (error.code.as_ref(), self) {
            ("required", Self::En) => "is required".to_string(),
            ("required", Self::Id) => "wajib diisi".to_string(),
            ("length", locale) => match (param("min"), param("max"), locale) {
                (Some(min), _, Self::En) => format!("must be at least {min} characters"),
                (Some(min), _, Self::Id) => format!("minimal {min} karakter"),
                (None, Some(max), Self::En) => format!("must be at most {max} characters"),
                (None, Some(max), Self::Id) => format!("maksimal {max} karakter"),
                (None, None, locale) => locale.invalid(),
            },
            ("uuid", Self::En) => "must be a valid UUID".to_string(),
            ("uuid", Self::Id) => "harus berupa UUID yang valid".to_string(),
            ("integer", Self::En) => "must be a valid integer".to_string(),
            ("integer", Self::Id) => "harus berupa bilangan bulat yang valid".to_string(),
            (_, locale) => locale.invalid(),
        }
    }

    fn invalid(self) -> String {
        match self {
            Self::En => "is invalid".to_string(),
            Self::Id => "tidak valid".to_string(),
        }
    }
}

/// Store the caller's [`RequestLocale`] in request extensions.
pub async fn locale_middleware(mut request: Request, next: Next) -> Response {
    let locale = RequestLocale::from_headers(request.headers());
    request.extensions_mut().insert(locale);
    next.run(request).await
}

impl<S> FromRequestParts<S> for RequestLocale
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestLocale>()
            .copied()
            .unwrap_or_else(|| RequestLocale::from_headers(&parts.headers)))
    }
}

/// JSON body that has been deserialized and validated.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let locale = req
            .extensions()
            .get::<RequestLocale>()
            .copied()
            .unwrap_or_else(|| RequestLocale::from_headers(req.headers()));

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                ApiError::BadRequest(format!("Invalid request format: {}", rejection.body_text()))
            })?;

        value
            .validate()
            .map_err(|errors| validation_error(locale, &errors))?;

        Ok(ValidatedJson(value))
    }
}

/// Translate validator output into a `validation_failed` error with
/// `details = { field: [messages] }`.
pub fn validation_error(locale: RequestLocale, errors: &ValidationErrors) -> ApiError {
    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (field, field_errors) in errors.field_errors() {
        fields.entry(field.to_string()).or_default().extend(
            field_errors
                .iter()
                .map(|error| locale.message(error)),
        );
    }
    failed(fields)
}

/// Parse a UUID path id.
pub fn parse_uuid(locale: RequestLocale, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| invalid_id(locale, "uuid"))
}

/// Parse a numeric path id.
pub fn parse_numeric_id(locale: RequestLocale, raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| invalid_id(locale, "integer"))
}

fn invalid_id(locale: RequestLocale, code: &'static str) -> ApiError {
    let message = locale.message(&ValidationError::new(code));
    failed(BTreeMap::from([("id".to_string(), vec![message])]))
}

fn failed(fields: BTreeMap<String, Vec<String>>) -> ApiError {
    let summary: Vec<String> = fields
        .iter()
        .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{field} {m}")))
        .collect();

    let details: Map<String, Value> = fields
        .into_iter()
        .map(|(field, messages)| (field, Value::from(messages)))
        .collect();

    ApiError::Validation {
        message: format!("Request validation failed: {}", summary.join(", ")),
        details: Some(Value::Object(details)),
    }
}
