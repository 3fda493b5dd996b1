//! Storefront carousel slides

use diesel::sql_types::{Integer, Nullable, Text};
use diesel::QueryableByName;
use serde_json::Value;
use validator::{Validate, ValidationErrors};

use super::value::{bool_lenient, int32_lenient, text_lenient};

#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct Slide {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub tenant_slug: String,
    #[diesel(sql_type = Text)]
    pub image_url: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub title: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub text: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub position: Option<i32>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub active: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    pub created_at: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub title_color: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub text_color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Validate)]
pub struct NewSlide {
    pub tenant_slug: String,
    #[validate(length(min = "1", message = "image_url requerida"))]
    pub image_url: String,
    pub title: String,
    pub text: String,
    pub title_color: String,
    pub text_color: String,
    pub position: i32,
    pub created_at: String,
}

impl NewSlide {
    pub fn from_payload(tenant_slug: String, payload: &Value, created_at: String) -> Result<Self, ValidationErrors> {
        let slide = Self {
            tenant_slug,
            image_url: text_lenient(payload.get("image_url")),
            title: text_lenient(payload.get("title")),
            text: text_lenient(payload.get("text")),
            title_color: text_lenient(payload.get("title_color")),
            text_color: text_lenient(payload.get("text_color")),
            position: payload.get("position").and_then(int32_lenient).unwrap_or(0),
            created_at,
        };
        slide.validate()?;
        Ok(slide)
    }
}

/// Fields of a slide edit; `None` leaves the column alone
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlideUpdate {
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub title_color: Option<String>,
    pub text_color: Option<String>,
    pub position: Option<i32>,
    pub active: Option<bool>,
}

impl SlideUpdate {
    /// Unparsable positions are ignored
    pub fn from_payload(payload: &Value) -> Self {
        let text = |key: &str| payload.get(key).map(|v| text_lenient(Some(v)));
        Self {
            image_url: text("image_url"),
            title: text("title"),
            text: text("text"),
            title_color: text("title_color"),
            text_color: text("text_color"),
            position: payload.get("position").and_then(int32_lenient),
            active: payload.get("active").map(|v| bool_lenient(v).unwrap_or(false)),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == SlideUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_is_required() {
        let err = NewSlide::from_payload("t".to_string(), &json!({"title": "Hola"}), String::new()).unwrap_err();
        assert!(err.field_errors().contains_key("image_url"));
        let slide = NewSlide::from_payload("t".to_string(), &json!({"image_url": "a.png", "position": "3"}), String::new()).unwrap();
        assert_eq!(slide.position, 3);
    }

    #[test]
    fn update_only_carries_given_fields() {
        let update = SlideUpdate::from_payload(&json!({"active": false, "position": "x"}));
        assert_eq!(update.active, Some(false));
        assert_eq!(update.position, None);
        assert!(SlideUpdate::from_payload(&json!({})).is_empty());
    }
}
