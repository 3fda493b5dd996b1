//! Thin HTTP plumbing over hyper: the `Application` service that turns controller failures
//! into JSON error responses, the path router and request/response helpers.

pub mod multipart;
pub mod request_util;
pub mod response_util;
pub mod router;

use std::marker::PhantomData;

use failure::{Context, Error as FailureError, Fail};
use futures::{future, Future};
use hyper::server::{Request, Response, Service};
use hyper::StatusCode;
use serde_json::Value;

use self::response_util::json_response;

pub type ControllerFuture = Box<dyn Future<Item = Response, Error = FailureError>>;

/// Request handler behind the `Application`
pub trait Controller {
    fn call(&self, request: Request) -> ControllerFuture;
}

/// Errors that know how they are answered over HTTP
pub trait Codeable: Fail {
    fn code(&self) -> StatusCode;
    fn payload(&self) -> Value;
}

/// hyper `Service` wrapping a controller; failures carrying an `E` are answered with its
/// status and payload, everything else with `500`
pub struct Application<E: Codeable> {
    controller: Box<dyn Controller>,
    _error: PhantomData<E>,
}

impl<E: Codeable> Application<E> {
    pub fn new<C: Controller + 'static>(controller: C) -> Self {
        Self {
            controller: Box::new(controller),
            _error: PhantomData,
        }
    }
}

/// First `E` found in the failure chain, bare or as a context
pub fn find_error<E: Codeable>(e: &FailureError) -> Option<&E> {
    e.iter_chain().filter_map(|cause| {
        cause
            .downcast_ref::<E>()
            .or_else(|| cause.downcast_ref::<Context<E>>().map(|context| context.get_context()))
    })
    .next()
}

pub fn error_response<E: Codeable>(e: &FailureError) -> Response {
    match find_error::<E>(e) {
        Some(error) => json_response(error.code(), &error.payload()),
        None => json_response(StatusCode::InternalServerError, &json!({"error": "error interno del servidor"})),
    }
}

impl<E: Codeable> Service for Application<E> {
    type Request = Request;
    type Response = Response;
    type Error = hyper::Error;
    type Future = Box<dyn Future<Item = Response, Error = hyper::Error>>;

    fn call(&self, request: Request) -> Self::Future {
        let method = request.method().clone();
        let path = request.path().to_string();
        Box::new(self.controller.call(request).or_else(move |e| {
            let response = error_response::<E>(&e);
            if response.status() == StatusCode::InternalServerError {
                error!("{} {} failed: {}", method, path, pretty_chain(&e));
            } else {
                debug!("{} {} answered {}: {}", method, path, response.status(), e);
            }
            future::ok(response)
        }))
    }
}

fn pretty_chain(e: &FailureError) -> String {
    e.iter_chain().map(|cause| cause.to_string()).collect::<Vec<_>>().join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn error_is_found_behind_contexts() {
        let e: FailureError = format_err!("missing row").context(Error::NotFound("Orden no encontrada".to_string())).into();
        let found = find_error::<Error>(&e).map(|error| error.code());
        assert_eq!(found, Some(StatusCode::NotFound));

        let plain: FailureError = format_err!("boom");
        assert!(find_error::<Error>(&plain).is_none());
    }
}
