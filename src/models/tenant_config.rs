//! Per-tenant configuration blob and the typed views the admin panel edits

use diesel::sql_types::{Nullable, Text};
use diesel::QueryableByName;
use serde_json::{Map, Value};
use validator::{ValidationError, ValidationErrors};

use super::value::{int_lenient, truthy};

pub const DEFAULT_WARNING_MINUTES: i64 = 15;
pub const DEFAULT_CRITICAL_MINUTES: i64 = 30;
pub const DEFAULT_TIP_PERCENT: i64 = 10;
pub const MAIN_ZONE_NAME: &str = "Salón Principal";

/// Keys of `POST /api/config` stored as integers when they parse
pub const INTEGER_KEYS: &[&str] = &["shipping_cost", "time_mesa", "time_espera", "time_delivery"];

/// Waiting time keys recomputed from history: (config key, order type, status that ends the wait)
pub const AUTO_TIME_TARGETS: &[(&str, &str, &str)] = &[
    ("time_mesa", "mesa", "listo"),
    ("time_espera", "espera", "listo"),
    ("time_delivery", "direccion", "entregado"),
];

#[derive(Clone, Debug, QueryableByName)]
pub struct TenantConfigRow {
    #[diesel(sql_type = Text)]
    pub tenant_slug: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub config_json: Option<String>,
}

impl TenantConfigRow {
    /// Missing or broken blobs read as an empty object
    pub fn config(&self) -> Value {
        parse_config(self.config_json.as_ref().map(String::as_str))
    }
}

pub fn parse_config(raw: Option<&str>) -> Value {
    raw.and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn object_mut<'a>(parent: &'a mut Value, key: &str) -> Option<&'a mut Map<String, Value>> {
    let map = parent.as_object_mut()?;
    let entry = map.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut()
}

fn positive_int(value: Option<&Value>) -> Option<i64> {
    value.and_then(int_lenient).filter(|v| *v != 0)
}

/// String form of a stored value, `None` for nulls
fn display_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Patch value: null, false and empty strings become ""
fn patch_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TenantSummary {
    pub slug: String,
    pub name: String,
}

impl TenantSummary {
    pub fn new(slug: String, config: &Value) -> Self {
        let name = config
            .pointer("/meta/branding/name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| slug.clone());
        Self { slug, name }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Sla {
    pub warning_minutes: i64,
    pub critical_minutes: i64,
}

impl Sla {
    /// Warning at least one minute, critical strictly after warning
    pub fn clamped(warning: i64, critical: i64) -> Self {
        let warning_minutes = warning.max(1);
        Self {
            warning_minutes,
            critical_minutes: critical.max(warning_minutes + 1),
        }
    }

    pub fn from_config(config: &Value) -> Self {
        let sla = config.get("sla");
        Self::clamped(
            positive_int(sla.and_then(|s| s.get("warning_minutes"))).unwrap_or(DEFAULT_WARNING_MINUTES),
            positive_int(sla.and_then(|s| s.get("critical_minutes"))).unwrap_or(DEFAULT_CRITICAL_MINUTES),
        )
    }

    pub fn from_payload(payload: &Value) -> Result<Self, ValidationErrors> {
        let warning = payload.get("warning_minutes").and_then(int_lenient);
        let critical = payload.get("critical_minutes").and_then(int_lenient);
        match (warning, critical) {
            (Some(w), Some(c)) => Ok(Self::clamped(w, c)),
            _ => {
                let mut errors = ValidationErrors::new();
                let mut error = ValidationError::new("invalid");
                error.message = Some("valores inválidos".into());
                errors.add("warning_minutes", error);
                Err(errors)
            }
        }
    }

    pub fn apply(&self, config: &mut Value) {
        if let Some(sla) = object_mut(config, "sla") {
            sla.insert("warning_minutes".to_string(), json!(self.warning_minutes));
            sla.insert("critical_minutes".to_string(), json!(self.critical_minutes));
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prefs {
    pub tip_percent: i64,
    pub tip_default_enabled: bool,
    pub ticket_format: String,
}

impl Prefs {
    pub fn from_config(config: &Value) -> Self {
        let prefs = config.get("prefs");
        let get = |key: &str| prefs.and_then(|p| p.get(key));
        let tip_percent = get("tip_percent")
            .and_then(int_lenient)
            .unwrap_or(DEFAULT_TIP_PERCENT)
            .max(0)
            .min(100);
        let tip_default_enabled = get("tip_default_enabled").and_then(Value::as_bool).unwrap_or(true);
        let ticket_format = match get("ticket_format").and_then(Value::as_str) {
            Some("compact") => "compact",
            _ => "full",
        };
        Self {
            tip_percent,
            tip_default_enabled,
            ticket_format: ticket_format.to_string(),
        }
    }
}

/// Contact block of the storefront header, `meta.branding.contact`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HeaderContact {
    pub whatsapp: String,
    pub instagram: String,
    pub location: String,
    pub location_label: String,
    pub location_url: String,
    pub opening_hours: Value,
    pub logo_url: String,
}

const CONTACT_TEXT_FIELDS: &[&str] = &["whatsapp", "instagram", "location", "location_label", "location_url", "logo_url"];

/// Opening hours come as an object or as a JSON string of one
fn opening_hours(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!({})),
        _ => json!({}),
    }
}

impl HeaderContact {
    pub fn from_config(config: &Value) -> Self {
        let contact = config.pointer("/meta/branding/contact");
        let get = |key: &str| display_text(contact.and_then(|c| c.get(key))).unwrap_or_default();
        Self {
            whatsapp: get("whatsapp"),
            instagram: get("instagram"),
            location: get("location"),
            location_label: get("location_label"),
            location_url: get("location_url"),
            opening_hours: opening_hours(contact.and_then(|c| c.get("opening_hours")).filter(|v| !v.is_null())),
            logo_url: get("logo_url"),
        }
    }

    /// Writes the fields present in `payload` into the blob and returns the resulting contact
    pub fn apply_patch(config: &mut Value, payload: &Value) -> Self {
        let contact = object_mut(config, "meta")
            .map(|meta| {
                meta.entry("branding".to_string()).or_insert_with(|| Value::Object(Map::new()))
            })
            .and_then(|branding| object_mut(branding, "contact"));
        if let Some(contact) = contact {
            for field in CONTACT_TEXT_FIELDS {
                if payload.get(*field).is_some() {
                    contact.insert(field.to_string(), Value::String(patch_text(payload.get(*field))));
                }
            }
            if payload.get("opening_hours").is_some() {
                contact.insert("opening_hours".to_string(), opening_hours(payload.get("opening_hours")));
            }
        }
        Self::from_config(config)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutSettings {
    pub whatsapp_number: String,
    pub whatsapp_enabled: bool,
    pub whatsapp_template: String,
}

impl CheckoutSettings {
    pub fn from_config(config: &Value) -> Self {
        let checkout = config.get("checkout");
        let text = |key: &str| {
            checkout
                .and_then(|c| c.get(key))
                .map(|v| patch_text(Some(v)))
                .unwrap_or_default()
        };
        Self {
            whatsapp_number: text("whatsappNumber"),
            whatsapp_enabled: checkout
                .and_then(|c| c.get("whatsappEnabled"))
                .map(truthy)
                .unwrap_or(true),
            whatsapp_template: text("whatsappTemplate"),
        }
    }

    /// Stores the snake_case payload fields under their camelCase names
    pub fn apply_patch(config: &mut Value, payload: &Value) -> Self {
        if let Some(checkout) = object_mut(config, "checkout") {
            if payload.get("whatsapp_number").is_some() {
                checkout.insert("whatsappNumber".to_string(), json!(patch_text(payload.get("whatsapp_number"))));
            }
            if let Some(enabled) = payload.get("whatsapp_enabled") {
                checkout.insert("whatsappEnabled".to_string(), json!(truthy(enabled)));
            }
            if payload.get("whatsapp_template").is_some() {
                checkout.insert("whatsappTemplate".to_string(), json!(patch_text(payload.get("whatsapp_template"))));
            }
        }
        Self::from_config(config)
    }
}

/// Integer knobs that parse are stored, the rest is ignored
pub fn apply_config_patch(config: &mut Value, payload: &Value) {
    if let Some(map) = config.as_object_mut() {
        for key in INTEGER_KEYS {
            if let Some(value) = payload.get(*key).and_then(int_lenient) {
                map.insert(key.to_string(), json!(value));
            }
        }
        if let Some(time_auto) = payload.get("time_auto") {
            map.insert("time_auto".to_string(), json!(truthy(time_auto)));
        }
    }
}

pub fn time_auto_enabled(config: &Value) -> bool {
    config.get("time_auto").map(truthy).unwrap_or(false)
}

/// Table layout as `{zones: [...]}`; flat legacy lists and empty layouts become one main zone
pub fn tables_view(config: &Value) -> Value {
    let main_zone = |tables: Vec<Value>| json!({"zones": [{"id": 1, "name": MAIN_ZONE_NAME, "tables": tables}]});
    match config.get("tables") {
        Some(Value::Array(list)) => main_zone(list.clone()),
        Some(Value::Object(map)) if !map.is_empty() => Value::Object(map.clone()),
        _ => main_zone(vec![]),
    }
}

/// A table layout must be an object holding `zones`
pub fn validate_tables(payload: &Value) -> Result<(), ValidationErrors> {
    if payload.get("zones").is_some() && payload.is_object() {
        return Ok(());
    }
    let mut errors = ValidationErrors::new();
    let mut error = ValidationError::new("invalid");
    error.message = Some("formato inválido".into());
    errors.add("zones", error);
    Err(errors)
}

/// Integer average of the durations strictly between 2 and 180 minutes
pub fn average_wait_minutes(durations: &[f64]) -> Option<i64> {
    let kept: Vec<f64> = durations.iter().cloned().filter(|m| *m > 2.0 && *m < 180.0).collect();
    if kept.is_empty() {
        None
    } else {
        Some((kept.iter().sum::<f64>() / kept.len() as f64) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sla_defaults_and_clamping() {
        assert_eq!(Sla::from_config(&json!({})), Sla::clamped(15, 30));
        let sla = Sla::from_config(&json!({"sla": {"warning_minutes": -3, "critical_minutes": 0}}));
        assert_eq!(sla, Sla { warning_minutes: 1, critical_minutes: 30 });
        assert_eq!(Sla::clamped(20, 10), Sla { warning_minutes: 20, critical_minutes: 21 });
        assert!(Sla::from_payload(&json!({"warning_minutes": 5})).is_err());
    }

    #[test]
    fn prefs_are_bounded() {
        let prefs = Prefs::from_config(&json!({"prefs": {"tip_percent": 250, "ticket_format": "tiny", "tip_default_enabled": false}}));
        assert_eq!(prefs.tip_percent, 100);
        assert_eq!(prefs.ticket_format, "full");
        assert!(!prefs.tip_default_enabled);
        assert_eq!(Prefs::from_config(&json!({})).tip_percent, 10);
    }

    #[test]
    fn header_patch_keeps_other_branding() {
        let mut config = json!({"meta": {"branding": {"name": "Local", "contact": {"instagram": "@local"}}}});
        let contact = HeaderContact::apply_patch(
            &mut config,
            &json!({"whatsapp": 5491100, "opening_hours": "{\"lun\": \"9-18\"}", "logo_url": null}),
        );
        assert_eq!(contact.whatsapp, "5491100");
        assert_eq!(contact.instagram, "@local");
        assert_eq!(contact.opening_hours, json!({"lun": "9-18"}));
        assert_eq!(contact.logo_url, "");
        assert_eq!(config["meta"]["branding"]["name"], json!("Local"));
    }

    #[test]
    fn checkout_is_stored_in_camel_case() {
        let mut config = json!({});
        let checkout = CheckoutSettings::apply_patch(&mut config, &json!({"whatsapp_number": "123"}));
        assert_eq!(config["checkout"]["whatsappNumber"], json!("123"));
        assert!(checkout.whatsapp_enabled);
        let checkout = CheckoutSettings::apply_patch(&mut config, &json!({"whatsapp_enabled": false}));
        assert!(!checkout.whatsapp_enabled);
    }

    #[test]
    fn legacy_table_lists_become_a_zone() {
        let view = tables_view(&json!({"tables": [{"n": 1}]}));
        assert_eq!(view["zones"][0]["name"], json!(MAIN_ZONE_NAME));
        assert_eq!(view["zones"][0]["tables"], json!([{"n": 1}]));
        assert_eq!(tables_view(&json!({}))["zones"][0]["tables"], json!([]));
        assert!(validate_tables(&json!([1])).is_err());
        assert!(validate_tables(&json!({"zones": []})).is_ok());
    }

    #[test]
    fn config_patch_ignores_unparsable_numbers() {
        let mut config = json!({"shipping_cost": 100});
        apply_config_patch(&mut config, &json!({"shipping_cost": "x", "time_mesa": "25", "time_auto": 1}));
        assert_eq!(config, json!({"shipping_cost": 100, "time_mesa": 25, "time_auto": true}));
        assert!(time_auto_enabled(&config));
    }

    #[test]
    fn wait_average_drops_outliers() {
        assert_eq!(average_wait_minutes(&[1.0, 10.0, 20.0, 400.0]), Some(15));
        assert_eq!(average_wait_minutes(&[2.0, 180.0]), None);
    }
}
