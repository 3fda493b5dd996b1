use hyper::header::{CacheControl, CacheDirective, ContentLength, Pragma, SetCookie};
use hyper::server::Response;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::Value;

pub fn bytes_response(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Response {
    let mut response = Response::new()
        .with_status(status)
        .with_header(ContentLength(body.len() as u64))
        .with_body(body);
    response.headers_mut().set_raw("Content-Type", content_type);
    response
}

pub fn json_response(status: StatusCode, body: &Value) -> Response {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    bytes_response(status, "application/json", bytes)
}

/// `200` JSON response of any serializable value
pub fn ok_json<T: Serialize>(body: &T) -> Response {
    match serde_json::to_value(body) {
        Ok(value) => json_response(StatusCode::Ok, &value),
        Err(e) => {
            error!("Response body could not be serialized: {}", e);
            json_response(StatusCode::InternalServerError, &json!({"error": "error interno del servidor"}))
        }
    }
}

pub fn text_response(status: StatusCode, body: &str) -> Response {
    bytes_response(status, "text/plain; charset=utf-8", body.as_bytes().to_vec())
}

/// CSV download named `filename`
pub fn csv_response(filename: &str, body: String) -> Response {
    let mut response = bytes_response(StatusCode::Ok, "text/csv; charset=utf-8", body.into_bytes());
    response
        .headers_mut()
        .set_raw("Content-Disposition", format!("attachment; filename=\"{}\"", filename));
    response
}

/// Marks a response as never cacheable
pub fn no_cache(mut response: Response) -> Response {
    {
        let headers = response.headers_mut();
        headers.set(CacheControl(vec![
            CacheDirective::NoStore,
            CacheDirective::NoCache,
            CacheDirective::MustRevalidate,
            CacheDirective::MaxAge(0),
        ]));
        headers.set(Pragma::NoCache);
        headers.set_raw("Expires", "0");
    }
    response
}

pub fn with_cookie(mut response: Response, cookie: String) -> Response {
    response.headers_mut().set(SetCookie(vec![cookie]));
    response
}
