//! Readers for query strings and JSON bodies of incoming requests

use std::collections::HashMap;

use serde_json::Value;

use crate::http::request_util::query_params;
use crate::models::time::expand_date_bound;
use crate::models::value::opt_text;
use crate::models::{ArchiveFilter, OrderFilter, SessionHistoryFilter};

/// Decoded query string; empty values read as absent
#[derive(Clone, Debug, Default)]
pub struct Query {
    params: HashMap<String, String>,
}

impl Query {
    pub fn new(raw: Option<&str>) -> Self {
        Self { params: query_params(raw) }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Integer parameter; absent or unparsable values read as `default`
    pub fn int(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|value| value.parse().ok()).unwrap_or(default)
    }

    /// Row ids; values outside the id column read as `default`
    pub fn id(&self, key: &str, default: i32) -> i32 {
        self.get(key).and_then(|value| value.parse().ok()).unwrap_or(default)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|value| match value.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                _ => false,
            })
            .unwrap_or(false)
    }

    /// `tenant_slug`, else `slug`
    pub fn tenant(&self) -> Option<String> {
        self.get("tenant_slug").or_else(|| self.get("slug"))
    }

    pub fn tenant_or(&self, default_slug: &str) -> String {
        self.tenant().unwrap_or_else(|| default_slug.to_string())
    }

    /// `(limit, offset)` with non-negative values
    pub fn paging(&self, default_limit: i64) -> (i64, i64) {
        (self.int("limit", default_limit).max(0), self.int("offset", 0).max(0))
    }
}

/// Tenant named by the body, then by the query, then the configured default
pub fn body_tenant(payload: &Value, query: &Query, default_slug: &str) -> String {
    opt_text(payload.get("tenant_slug"))
        .or_else(|| query.tenant())
        .unwrap_or_else(|| default_slug.to_string())
}

pub fn order_filter(query: &Query, tenant_slug: String) -> OrderFilter {
    OrderFilter {
        tenant_slug,
        status: query.get("status"),
        id: query.get("id").and_then(|id| id.parse().ok()),
        q: query.get("q"),
        from: query.get("from"),
        to: query.get("to"),
        exclude_archived: query.flag("exclude_archived"),
    }
}

pub fn archive_filter(query: &Query, tenant_slug: String) -> ArchiveFilter {
    ArchiveFilter::new(
        tenant_slug,
        query.get("type"),
        query.get("date_field").as_ref().map(String::as_str),
        query.get("from"),
        query.get("to"),
        query.get("order_type"),
        query.get("q").as_ref().map(String::as_str),
    )
}

/// Closed sessions filter; `date_field=opened` switches the date column
pub fn session_history_filter(query: &Query, tenant_slug: String) -> SessionHistoryFilter {
    SessionHistoryFilter {
        tenant_slug,
        by_opened_at: query.get("date_field").map(|field| field.to_lowercase() == "opened").unwrap_or(false),
        from: query.get("from").map(|date| expand_date_bound(&date, false)),
        to: query.get("to").map(|date| expand_date_bound(&date, true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_falls_back_through_slug_and_default() {
        let query = Query::new(Some("slug=local2"));
        assert_eq!(query.tenant_or("default"), "local2");
        assert_eq!(Query::new(Some("tenant_slug=&slug=")).tenant_or("default"), "default");
        assert_eq!(body_tenant(&json!({"tenant_slug": "local3"}), &query, "default"), "local3");
        assert_eq!(body_tenant(&json!({}), &query, "default"), "local2");
    }

    #[test]
    fn unparsable_numbers_use_defaults() {
        let query = Query::new(Some("limit=abc&offset=-4"));
        assert_eq!(query.paging(50), (50, 0));
    }

    #[test]
    fn ids_too_wide_for_the_column_use_defaults() {
        let query = Query::new(Some("session_id=3000000000&order=7"));
        assert_eq!(query.id("session_id", 0), 0);
        assert_eq!(query.id("order", 0), 7);
    }

    #[test]
    fn order_filter_ignores_non_numeric_ids() {
        let query = Query::new(Some("id=x12&q=mesa&exclude_archived=true"));
        let filter = order_filter(&query, "t".to_string());
        assert_eq!(filter.id, None);
        assert_eq!(filter.q, Some("mesa".to_string()));
        assert!(filter.exclude_archived);
    }

    #[test]
    fn history_dates_cover_whole_days() {
        let query = Query::new(Some("date_field=opened&from=2024-03-01&to=2024-03-02"));
        let filter = session_history_filter(&query, "t".to_string());
        assert!(filter.by_opened_at);
        assert_eq!(filter.from, Some("2024-03-01T00:00:00".to_string()));
        assert_eq!(filter.to, Some("2024-03-02T23:59:59".to_string()));
    }
}
