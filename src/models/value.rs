//! Lenient readers for JSON payloads sent by the admin panel and the storefront,
//! which mix numbers, numeric strings and nulls freely.

use std::convert::TryFrom;

use serde_json::Value;

/// Integer out of a number, a float or a numeric string
pub fn int_lenient(value: &Value) -> Option<i64> {
    match *value {
        Value::Number(ref n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(ref s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        Value::Bool(b) => Some(b as i64),
        _ => None,
    }
}

/// Same as `int_lenient`, limited to what an integer column holds
pub fn int32_lenient(value: &Value) -> Option<i32> {
    int_lenient(value).and_then(|v| i32::try_from(v).ok())
}

/// Same as `int_lenient`, but null, empty and unparsable values read as `default`
pub fn int_or(value: Option<&Value>, default: i64) -> i64 {
    value.and_then(int_lenient).unwrap_or(default)
}

/// Trimmed text; numbers are rendered, null and missing values read as empty
pub fn text_lenient(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Trimmed non-empty text or `None`
pub fn opt_text(value: Option<&Value>) -> Option<String> {
    Some(text_lenient(value)).filter(|s| !s.is_empty())
}

/// Truthiness the way form posts and JSON bodies express it
pub fn bool_lenient(value: &Value) -> Option<bool> {
    match *value {
        Value::Bool(b) => Some(b),
        Value::Number(ref n) => n.as_f64().map(|f| f != 0.0),
        Value::String(ref s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" | "si" | "sí" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        Value::Null => None,
        _ => Some(true),
    }
}

/// Like `bool_lenient`, but any other non-null value counts as set
pub fn truthy(value: &Value) -> bool {
    bool_lenient(value).unwrap_or(!value.is_null())
}

/// First present key of `keys`, skipping nulls
pub fn first_of<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| obj.get(*key)).find(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_accept_numbers_and_numeric_strings() {
        assert_eq!(int_lenient(&json!(12)), Some(12));
        assert_eq!(int_lenient(&json!(" 7 ")), Some(7));
        assert_eq!(int_lenient(&json!("3.9")), Some(3));
        assert_eq!(int_lenient(&json!(2.5)), Some(2));
        assert_eq!(int_lenient(&json!("abc")), None);
        assert_eq!(int_lenient(&Value::Null), None);
        assert_eq!(int_or(None, 5), 5);
        assert_eq!(int32_lenient(&json!("42")), Some(42));
        assert_eq!(int32_lenient(&json!(3_000_000_000i64)), None);
    }

    #[test]
    fn text_is_trimmed_and_null_is_empty() {
        assert_eq!(text_lenient(Some(&json!("  hola "))), "hola");
        assert_eq!(text_lenient(Some(&json!(15))), "15");
        assert_eq!(text_lenient(Some(&Value::Null)), "");
        assert_eq!(text_lenient(None), "");
        assert_eq!(opt_text(Some(&json!("   "))), None);
    }

    #[test]
    fn bools_from_form_values() {
        assert_eq!(bool_lenient(&json!("true")), Some(true));
        assert_eq!(bool_lenient(&json!("0")), Some(false));
        assert_eq!(bool_lenient(&json!(1)), Some(true));
        assert_eq!(bool_lenient(&json!("quizas")), None);
        assert!(truthy(&json!("quizas")));
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!("off")));
    }

    #[test]
    fn first_of_skips_nulls() {
        let item = json!({"quantity": null, "qty": 3});
        assert_eq!(first_of(&item, &["quantity", "qty"]), Some(&json!(3)));
        assert_eq!(first_of(&item, &["missing"]), None);
    }
}
