use std::convert::TryFrom;
use std::fmt;

use failure::{Backtrace, Context, Fail};
use serde_json::Value;
use validator::{ValidationError, ValidationErrors};

use diesel::result::Error as DieselError;

use crate::repos::{Error as RepoError, ErrorKind as RepoErrorKind};

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "service error - internal")]
    Internal,
    #[fail(display = "service error - not found: {}", _0)]
    NotFound(String),
    #[fail(display = "service error - unauthorized: {}", _0)]
    Unauthorized(String),
    #[fail(display = "service error - forbidden: {}", _0)]
    Forbidden(String),
    #[fail(display = "service error - conflict: {}", _0)]
    Conflict(String),
    #[fail(display = "service error - invalid input: {}", _0)]
    Validation(ValidationErrors),
    #[fail(display = "service error - upstream: {}", _0)]
    Upstream(String),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorSource {
    #[fail(display = "service source - r2d2")]
    R2d2,
    #[fail(display = "service source - bcrypt")]
    Bcrypt,
    #[fail(display = "service source - cloudinary")]
    Cloudinary,
    #[fail(display = "service source - io")]
    Io,
}

derive_error_impls!();

impl From<RepoErrorKind> for ErrorKind {
    fn from(e: RepoErrorKind) -> Self {
        match e {
            RepoErrorKind::Constraints(errors) => ErrorKind::Validation(errors),
            RepoErrorKind::Forbidden => ErrorKind::Forbidden("acceso denegado al tenant".to_string()),
            RepoErrorKind::NotFound => ErrorKind::NotFound("no encontrado".to_string()),
            RepoErrorKind::Internal => ErrorKind::Internal,
        }
    }
}

/// Lets `DbConnection::transaction` run closures returning service errors
impl From<DieselError> for Error {
    fn from(e: DieselError) -> Self {
        let e = RepoError::from(e);
        let kind = ErrorKind::from(e.kind());
        ectx!(err e, kind)
    }
}

/// Single field validation failure with a human message
pub fn invalid(field: &'static str, message: &str) -> ErrorKind {
    invalid_with(field, message, &[])
}

/// Like `invalid`, with extra params that end up next to the message in the response
pub fn invalid_with(field: &'static str, message: &str, params: &[(&'static str, Value)]) -> ErrorKind {
    let mut errors = ValidationErrors::new();
    let mut error = ValidationError::new("invalid");
    error.message = Some(message.to_string().into());
    for (name, value) in params {
        error.add_param((*name).into(), value);
    }
    errors.add(field, error);
    ErrorKind::Validation(errors)
}

/// `Err` of the local error type carrying `kind`, for early returns
pub fn fail<T>(kind: ErrorKind) -> Result<T, Error> {
    let e = format_err!("{}", kind);
    Err(ectx!(err e, kind))
}

/// Money and quantities are stored in 32-bit columns; anything wider is rejected as input
pub fn narrow(field: &'static str, value: i64) -> Result<i32, Error> {
    match i32::try_from(value) {
        Ok(value) => Ok(value),
        Err(_) => fail(out_of_range(field, Some(value))),
    }
}

/// Validation kind for an amount that does not fit, `None` when the sum itself overflowed
pub fn out_of_range(field: &'static str, value: Option<i64>) -> ErrorKind {
    match value {
        Some(value) => invalid_with(field, "valor fuera de rango", &[("value", json!(value))]),
        None => invalid(field, "valor fuera de rango"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_kinds_keep_their_meaning() {
        match ErrorKind::from(RepoErrorKind::Forbidden) {
            ErrorKind::Forbidden(_) => {}
            other => panic!("unexpected kind {:?}", other),
        }
        match ErrorKind::from(RepoErrorKind::NotFound) {
            ErrorKind::NotFound(_) => {}
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn invalid_carries_message_and_params() {
        match invalid_with("stock", "stock insuficiente", &[("stock", json!(2))]) {
            ErrorKind::Validation(errors) => {
                let fields = errors.field_errors();
                let error = &fields["stock"][0];
                assert_eq!(error.message.as_ref().map(|m| m.to_string()), Some("stock insuficiente".to_string()));
                assert_eq!(error.params["stock"], json!(2));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn narrow_rejects_what_the_column_cannot_hold() {
        assert_eq!(narrow("total", 2800).unwrap(), 2800);
        assert_eq!(narrow("total", -50).unwrap(), -50);
        match narrow("total", 3_000_000_000).unwrap_err().kind() {
            ErrorKind::Validation(errors) => {
                let fields = errors.field_errors();
                assert_eq!(fields["total"][0].params["value"], json!(3_000_000_000i64));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
