use std::collections::HashMap;

use failure::Error as FailureError;
use futures::{Future, Stream};
use hyper::header::Headers;
use hyper::Body;
use serde_json::{Map, Value};

/// Whole request body
pub fn read_body(body: Body) -> Box<dyn Future<Item = Vec<u8>, Error = FailureError>> {
    Box::new(body.concat2().map(|chunk| chunk.to_vec()).map_err(FailureError::from))
}

/// Body as a JSON object; empty, malformed and non-object bodies read as `{}`
pub fn parse_json_object(bytes: &[u8]) -> Value {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// Body as any JSON value, `Null` when it does not parse
pub fn parse_json(bytes: &[u8]) -> Value {
    serde_json::from_slice::<Value>(bytes).unwrap_or(Value::Null)
}

/// Decoded query string; the last occurrence of a key wins
pub fn query_params(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// First value of a header as text
pub fn header_value(headers: &Headers, name: &str) -> Option<String> {
    headers
        .get_raw(name)
        .and_then(|raw| raw.one())
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Value of cookie `name` in any `Cookie` header line
pub fn cookie_value(headers: &Headers, name: &str) -> Option<String> {
    let raw = headers.get_raw("Cookie")?;
    raw.iter()
        .filter_map(|line| std::str::from_utf8(line).ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) if key == name => Some(value.to_string()),
                _ => None,
            }
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_are_decoded() {
        let params = query_params(Some("q=caf%C3%A9+con&limit=5&limit=7"));
        assert_eq!(params["q"], "café con");
        assert_eq!(params["limit"], "7");
        assert!(query_params(None).is_empty());
    }

    #[test]
    fn cookies_are_found_among_others() {
        let mut headers = Headers::new();
        headers.set_raw("Cookie", "theme=dark; session=abc-123");
        assert_eq!(cookie_value(&headers, "session"), Some("abc-123".to_string()));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn bodies_fall_back_to_empty_objects() {
        assert_eq!(parse_json_object(b""), json!({}));
        assert_eq!(parse_json_object(b"[1]"), json!({}));
        assert_eq!(parse_json_object(br#"{"a":1}"#), json!({"a": 1}));
    }
}
