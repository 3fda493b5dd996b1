//! Catalog products

use std::convert::TryFrom;

use diesel::sql_types::{Integer, Text};
use diesel::QueryableByName;
use serde_json::{Map, Value};
use validator::{ValidationError, ValidationErrors};

use super::value::{bool_lenient, int32_lenient, int_lenient, text_lenient};

/// Catalog row with nullable text columns already coalesced to empty strings
#[derive(Clone, Debug, QueryableByName)]
pub struct Product {
    #[diesel(sql_type = Text)]
    pub product_id: String,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Integer)]
    pub price: i32,
    #[diesel(sql_type = Integer)]
    pub stock: i32,
    #[diesel(sql_type = Integer)]
    pub active: i32,
    #[diesel(sql_type = Text)]
    pub details: String,
    #[diesel(sql_type = Text)]
    pub variants_json: String,
    #[diesel(sql_type = Text)]
    pub last_modified: String,
    #[diesel(sql_type = Text)]
    pub image_url: String,
}

/// Product as the storefront and the admin panel read it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub price: i32,
    pub stock: i32,
    pub active: bool,
    pub details: String,
    pub variants: String,
    pub last_modified: String,
    pub image_url: String,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        Self {
            id: p.product_id,
            name: p.name,
            price: p.price,
            stock: p.stock,
            active: p.active != 0,
            details: p.details,
            variants: p.variants_json,
            last_modified: p.last_modified,
            image_url: p.image_url,
        }
    }
}

/// Stock and price of one product, read while placing an order
#[derive(Clone, Copy, Debug, PartialEq, QueryableByName)]
pub struct StockLevel {
    #[diesel(sql_type = Integer)]
    pub stock: i32,
}

/// Product created on the fly when a cart line references an unknown id
#[derive(Clone, Debug, PartialEq)]
pub struct NewProduct {
    pub tenant_slug: String,
    pub product_id: String,
    pub name: String,
    pub price: i32,
    pub stock: i32,
    pub details: String,
    pub variants_json: String,
    pub image_url: String,
    pub last_modified: String,
}

fn invalid(field: &'static str, message: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let mut error = ValidationError::new("invalid");
    error.message = Some(message.to_string().into());
    errors.add(field, error);
    errors
}

/// `{section, interest_tag, food_categories}`, each key present only when set.
/// Categories come either as a list or as a comma separated string.
pub fn build_variants(section: &str, interest_tag: &str, food_categories: Option<&Value>) -> Value {
    let categories: Vec<Value> = match food_categories {
        Some(Value::Array(list)) => list.iter().filter(|v| !v.is_null()).cloned().collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| Value::String(c.to_string()))
            .collect(),
        _ => vec![],
    };
    let section = if section.is_empty() && !categories.is_empty() {
        "main"
    } else {
        section
    };

    let mut variants = Map::new();
    if !section.is_empty() {
        variants.insert("section".to_string(), json!(section));
    }
    if !interest_tag.is_empty() {
        variants.insert("interest_tag".to_string(), json!(interest_tag));
    }
    if !categories.is_empty() {
        variants.insert("food_categories".to_string(), Value::Array(categories));
    }
    Value::Object(variants)
}

/// Admin upsert of a product
#[derive(Clone, Debug, PartialEq)]
pub struct UpsertProduct {
    pub tenant_slug: String,
    pub product_id: String,
    pub name: String,
    pub price: i32,
    pub stock: i32,
    pub details: String,
    pub image_url: String,
    pub variants: Value,
}

impl UpsertProduct {
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationErrors> {
        let price = payload
            .get("price")
            .and_then(int32_lenient)
            .ok_or_else(|| invalid("price", "Precio inválido"))?;
        let stock = match payload.get("stock").and_then(int_lenient) {
            Some(stock) => i32::try_from(stock).map_err(|_| invalid("stock", "stock inválido"))?,
            None => 0,
        };
        let tenant_slug = text_lenient(payload.get("tenant_slug"));
        let product_id = text_lenient(payload.get("id"));
        let name = text_lenient(payload.get("name"));
        if tenant_slug.is_empty() || product_id.is_empty() || name.is_empty() {
            return Err(invalid("id", "Faltan campos obligatorios (tenant, id, name)"));
        }
        Ok(Self {
            tenant_slug,
            product_id,
            name,
            price,
            stock,
            details: text_lenient(payload.get("details")),
            image_url: text_lenient(payload.get("image_url")),
            variants: build_variants(
                &text_lenient(payload.get("section")),
                &text_lenient(payload.get("interest_tag")),
                payload.get("food_categories"),
            ),
        })
    }

    pub fn into_new_product(self, now: String) -> NewProduct {
        NewProduct {
            tenant_slug: self.tenant_slug,
            product_id: self.product_id,
            name: self.name,
            price: self.price,
            stock: self.stock,
            details: self.details,
            variants_json: self.variants.to_string(),
            image_url: self.image_url,
            last_modified: now,
        }
    }
}

/// Partial edit from the admin panel; only the fields present in the body change
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductUpdate {
    pub stock: Option<i32>,
    pub price: Option<i32>,
    pub active: Option<bool>,
    pub name: Option<String>,
    pub details: Option<String>,
    pub image_url: Option<String>,
    pub variants_json: Option<String>,
}

impl ProductUpdate {
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationErrors> {
        let mut update = ProductUpdate::default();
        if let Some(stock) = payload.get("stock") {
            let stock = int32_lenient(stock).ok_or_else(|| invalid("stock", "stock inválido"))?;
            update.stock = Some(stock.max(0));
        }
        if let Some(price) = payload.get("price") {
            let price = int32_lenient(price).ok_or_else(|| invalid("price", "price inválido"))?;
            update.price = Some(price.max(0));
        }
        if let Some(active) = payload.get("active") {
            update.active = Some(bool_lenient(active).unwrap_or(false));
        }
        if payload.get("name").is_some() {
            let name = text_lenient(payload.get("name"));
            if name.is_empty() {
                return Err(invalid("name", "name requerido"));
            }
            update.name = Some(name);
        }
        if payload.get("details").is_some() {
            update.details = Some(text_lenient(payload.get("details")));
        }
        if payload.get("image_url").is_some() {
            update.image_url = Some(text_lenient(payload.get("image_url")));
        }
        if let Some(variants) = payload.get("variants") {
            update.variants_json = Some(match *variants {
                Value::String(ref raw) => {
                    serde_json::from_str::<Value>(raw).map_err(|_| invalid("variants", "variants inválido"))?;
                    raw.clone()
                }
                Value::Null => "[]".to_string(),
                ref other => other.to_string(),
            });
        }
        if update == ProductUpdate::default() {
            return Err(invalid("fields", "sin cambios"));
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_default_the_section_to_main() {
        let variants = build_variants("", "", Some(&json!("pizzas, , empanadas")));
        assert_eq!(variants, json!({"section": "main", "food_categories": ["pizzas", "empanadas"]}));
        assert_eq!(build_variants("", "", None), json!({}));
        assert_eq!(
            build_variants("bebidas", "promo", Some(&json!([]))),
            json!({"section": "bebidas", "interest_tag": "promo"})
        );
    }

    #[test]
    fn upsert_checks_price_before_required_fields() {
        let err = UpsertProduct::from_payload(&json!({"price": "caro"})).unwrap_err();
        assert!(err.field_errors().contains_key("price"));
        let err = UpsertProduct::from_payload(&json!({"price": 10, "tenant_slug": "t", "id": "p"})).unwrap_err();
        assert!(err.field_errors().contains_key("id"));
        let ok = UpsertProduct::from_payload(&json!({"price": "10", "tenant_slug": "t", "id": "p", "name": "Pizza"})).unwrap();
        assert_eq!(ok.stock, 0);
        assert_eq!(ok.price, 10);
    }

    #[test]
    fn update_clamps_and_validates() {
        let update = ProductUpdate::from_payload(&json!({"stock": -4, "price": "12", "variants": {"a": 1}})).unwrap();
        assert_eq!(update.stock, Some(0));
        assert_eq!(update.price, Some(12));
        assert_eq!(update.variants_json, Some(r#"{"a":1}"#.to_string()));

        assert!(ProductUpdate::from_payload(&json!({"stock": "x"})).is_err());
        assert!(ProductUpdate::from_payload(&json!({"name": "  "})).is_err());
        assert!(ProductUpdate::from_payload(&json!({"variants": "{no"})).is_err());
        let err = ProductUpdate::from_payload(&json!({"other": 1})).unwrap_err();
        assert!(err.field_errors().contains_key("fields"));
    }
}
