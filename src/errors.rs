use hyper::StatusCode;
use serde_json::{Map, Value};
use validator::ValidationErrors;

use crate::http::Codeable;
use crate::services::ErrorKind as ServiceErrorKind;

pub const NOT_AUTHORIZED: &str = "no autorizado";
pub const BAD_CSRF: &str = "csrf inválido";

/// Error answered to HTTP clients as `{"error": "..."}` plus optional extra fields
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Not found: {}", _0)]
    NotFound(String),
    #[fail(display = "Parse error: {}", _0)]
    Parse(String),
    #[fail(display = "Validation error")]
    Validate(ValidationErrors),
    #[fail(display = "Unauthorized: {}", _0)]
    Unauthorized(String),
    #[fail(display = "Server is refusing to fullfil the request: {}", _0)]
    Forbidden(String),
    #[fail(display = "Conflict: {}", _0)]
    Conflict(String),
    #[fail(display = "Upstream error: {}", _0)]
    Upstream(String),
    #[fail(display = "Internal server error")]
    Internal,
}

impl Error {
    pub fn unauthorized() -> Self {
        Error::Unauthorized(NOT_AUTHORIZED.to_string())
    }

    pub fn bad_csrf() -> Self {
        Error::Forbidden(BAD_CSRF.to_string())
    }
}

impl Codeable for Error {
    fn code(&self) -> StatusCode {
        match *self {
            Error::NotFound(_) => StatusCode::NotFound,
            Error::Parse(_) | Error::Validate(_) => StatusCode::BadRequest,
            Error::Unauthorized(_) => StatusCode::Unauthorized,
            Error::Forbidden(_) => StatusCode::Forbidden,
            Error::Conflict(_) => StatusCode::Conflict,
            Error::Upstream(_) | Error::Internal => StatusCode::InternalServerError,
        }
    }

    /// `{"error": message}`; validation params are merged next to the message
    fn payload(&self) -> Value {
        let mut body = Map::new();
        match *self {
            Error::Validate(ref errors) => {
                let fields = errors.clone().field_errors();
                let mut names: Vec<&&str> = fields.keys().collect();
                names.sort();
                let first = names.first().and_then(|name| fields[**name].first());
                match first {
                    Some(error) => {
                        let message = error
                            .message
                            .as_ref()
                            .map(|message| message.to_string())
                            .unwrap_or_else(|| error.code.to_string());
                        body.insert("error".to_string(), Value::String(message));
                        for (name, value) in &error.params {
                            if *name != "value" {
                                body.insert(name.to_string(), value.clone());
                            }
                        }
                    }
                    None => {
                        body.insert("error".to_string(), Value::String("datos inválidos".to_string()));
                    }
                }
            }
            Error::NotFound(ref message)
            | Error::Parse(ref message)
            | Error::Unauthorized(ref message)
            | Error::Forbidden(ref message)
            | Error::Conflict(ref message)
            | Error::Upstream(ref message) => {
                body.insert("error".to_string(), Value::String(message.clone()));
            }
            Error::Internal => {
                body.insert("error".to_string(), Value::String("error interno del servidor".to_string()));
            }
        }
        Value::Object(body)
    }
}

impl From<ServiceErrorKind> for Error {
    fn from(kind: ServiceErrorKind) -> Self {
        match kind {
            ServiceErrorKind::NotFound(message) => Error::NotFound(message),
            ServiceErrorKind::Unauthorized(message) => Error::Unauthorized(message),
            ServiceErrorKind::Forbidden(message) => Error::Forbidden(message),
            ServiceErrorKind::Conflict(message) => Error::Conflict(message),
            ServiceErrorKind::Validation(errors) => Error::Validate(errors),
            ServiceErrorKind::Upstream(message) => Error::Upstream(message),
            ServiceErrorKind::Internal => Error::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::error::invalid_with;

    #[test]
    fn validation_params_are_flattened_next_to_the_message() {
        let kind = invalid_with(
            "stock",
            "stock insuficiente",
            &[("product_id", json!("p1")), ("stock", json!(1)), ("requested", json!(3))],
        );
        let error = Error::from(kind);
        assert_eq!(error.code(), StatusCode::BadRequest);
        assert_eq!(
            error.payload(),
            json!({"error": "stock insuficiente", "product_id": "p1", "stock": 1, "requested": 3})
        );
    }

    #[test]
    fn service_kinds_pick_their_status() {
        let error = Error::from(ServiceErrorKind::Conflict("usuario ya existe".to_string()));
        assert_eq!(error.code(), StatusCode::Conflict);
        assert_eq!(error.payload(), json!({"error": "usuario ya existe"}));
        assert_eq!(Error::Internal.code(), StatusCode::InternalServerError);
    }
}
