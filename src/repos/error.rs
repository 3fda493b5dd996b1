use std::fmt;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use failure::{Backtrace, Context, Fail};
use validator::{ValidationError, ValidationErrors};

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "repo error - duplicated row: {}", _0)]
    Constraints(ValidationErrors),
    #[fail(display = "repo error - internal")]
    Internal,
    #[fail(display = "repo error - tenant not accessible")]
    Forbidden,
    #[fail(display = "repo error - row not found")]
    NotFound,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorSource {
    #[fail(display = "repo source - database")]
    Diesel,
    #[fail(display = "repo source - tenant ACL")]
    Acl,
}

derive_error_impls!();

impl<'a> From<&'a DieselError> for ErrorKind {
    fn from(e: &DieselError) -> Self {
        match e {
            // username of an admin, slug of a tenant config, id of a product within its tenant
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
                let mut errors = ValidationErrors::new();
                let mut error = ValidationError::new("unique");
                error.message = Some("registro duplicado".into());
                error.add_param("constraint".into(), &info.message());
                errors.add("unique", error);
                ErrorKind::Constraints(errors)
            }
            DieselError::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<DieselError> for Error {
    fn from(e: DieselError) -> Self {
        let kind = ErrorKind::from(&e);
        ectx!(err e, ErrorSource::Diesel, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violations_become_constraint_errors() {
        let e = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("UNIQUE constraint failed: admin_users.username".to_string()),
        );
        match ErrorKind::from(&e) {
            ErrorKind::Constraints(errors) => {
                let fields = errors.field_errors();
                assert_eq!(fields["unique"][0].params["constraint"], json!("UNIQUE constraint failed: admin_users.username"));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match ErrorKind::from(&DieselError::NotFound) {
            ErrorKind::NotFound => {}
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
