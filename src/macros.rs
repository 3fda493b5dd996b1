//! Error context helpers shared by every layer.
//!
//! Each layer has its own `Error { inner: Context<ErrorKind> }` type. The macros below expect
//! `Error`, `ErrorKind` and `failure::Fail` to be in scope at the call site and always produce
//! that local `Error`, so they can be used both in `map_err` and before `?`.

/// Attaches the call location, optional debug args and contexts to an error.
///
/// * `ectx!(err e, ErrorContext::X, ErrorKind::Y => arg1, arg2)` - wraps `e` right away
/// * `ectx!(convert => arg)` - closure for `map_err` that keeps the kind of a lower layer error
/// * `ectx!(ErrorKind::Y => arg)` - closure for `map_err` with explicit contexts
#[macro_export]
macro_rules! ectx {
    (err $e:expr $(, $context:expr)* $(=> $($arg:expr),*)*) => {{
        #[allow(unused_mut)]
        let mut msg = format!("at {}:{}", file!(), line!());
        $(
            $(
                msg.push_str(&format!("\nwith args - {}: {:?}", stringify!($arg), $arg));
            )*
        )*
        let err = $e.context(msg);
        $(
            let err = err.context($context);
        )*
        let err: Error = err.into();
        err
    }};
    (convert $(, $context:expr)* $(=> $($arg:expr),*)*) => {
        |e| {
            let kind: ErrorKind = e.kind().into();
            ectx!(err e $(, $context)*, kind $(=> $($arg),*)*)
        }
    };
    ($($context:expr),* $(=> $($arg:expr),*)*) => {
        |e| ectx!(err e $(, $context)* $(=> $($arg),*)*)
    };
}

/// Implements `Fail`, `Display`, `kind()` and conversions for a layer `Error`
/// wrapping `Context<ErrorKind>`.
#[macro_export]
macro_rules! derive_error_impls {
    () => {
        impl Fail for Error {
            fn cause(&self) -> Option<&dyn Fail> {
                self.inner.cause()
            }

            fn backtrace(&self) -> Option<&Backtrace> {
                self.inner.backtrace()
            }
        }

        impl fmt::Display for Error {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.inner, f)
            }
        }

        impl Error {
            #[allow(dead_code)]
            pub fn kind(&self) -> ErrorKind {
                self.inner.get_context().clone()
            }
        }

        impl From<ErrorKind> for Error {
            fn from(kind: ErrorKind) -> Error {
                Error {
                    inner: Context::new(kind),
                }
            }
        }

        impl From<Context<ErrorKind>> for Error {
            fn from(inner: Context<ErrorKind>) -> Error {
                Error { inner: inner }
            }
        }
    };
}

/// Shorthand for building a `Permission`; omitted action means `Action::All`,
/// omitted scope means `Scope::All`.
#[macro_export]
macro_rules! permission {
    ($resource:expr) => {
        Permission {
            resource: $resource,
            action: Action::All,
            scope: Scope::All,
        }
    };
    ($resource:expr, $action:expr) => {
        Permission {
            resource: $resource,
            action: $action,
            scope: Scope::All,
        }
    };
    ($resource:expr, $action:expr, $scope:expr) => {
        Permission {
            resource: $resource,
            action: $action,
            scope: $scope,
        }
    };
}
