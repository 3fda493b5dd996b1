//! Archived orders: search filters, report rows and the metrics derived from them

use std::fmt;
use std::str::FromStr;

use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use diesel::QueryableByName;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::time::{expand_date_bound, minutes_between};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    Delivered,
    Canceled,
    Reset,
}

impl ArchiveType {
    /// Status whose history row makes an order eligible, `None` for manual resets
    pub fn trigger_status(self) -> Option<&'static str> {
        match self {
            ArchiveType::Delivered => Some("entregado"),
            ArchiveType::Canceled => Some("cancelado"),
            ArchiveType::Reset => None,
        }
    }
}

impl FromStr for ArchiveType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivered" => Ok(ArchiveType::Delivered),
            "canceled" => Ok(ArchiveType::Canceled),
            "reset" => Ok(ArchiveType::Reset),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ArchiveType::Delivered => write!(f, "delivered"),
            ArchiveType::Canceled => write!(f, "canceled"),
            ArchiveType::Reset => write!(f, "reset"),
        }
    }
}

/// How the free text `q` of a search is applied
#[derive(Clone, Debug, PartialEq)]
pub enum SearchTerm {
    OrderId(i32),
    /// Lowercased text for SQL `LIKE` and its accent-folded form for the final match
    Text { like: String, folded: String },
}

impl SearchTerm {
    pub fn parse(q: &str) -> Option<Self> {
        let q = q.trim();
        if q.is_empty() {
            return None;
        }
        if let Ok(id) = q.parse::<i32>() {
            return Some(SearchTerm::OrderId(id));
        }
        let text = strip_destination_prefix(q);
        Some(SearchTerm::Text {
            like: format!("%{}%", text.to_lowercase()),
            folded: fold_accents(&text),
        })
    }
}

/// Lowercase, NFKD, combining marks removed
pub fn fold_accents(s: &str) -> String {
    s.to_lowercase().nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

const DESTINATION_PREFIXES: &[&str] = &["destino", "direccion", "dir"];

/// `destino: Mitre 10` searches for `Mitre 10`
pub fn strip_destination_prefix(q: &str) -> String {
    let lower = q.to_lowercase();
    for prefix in DESTINATION_PREFIXES {
        if lower.starts_with(prefix) && q.is_char_boundary(prefix.len()) {
            let rest = q[prefix.len()..].trim_start();
            if rest.starts_with(':') {
                return rest[1..].trim().to_string();
            }
        }
    }
    q.trim().to_string()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArchiveFilter {
    pub tenant_slug: String,
    pub archive_type: Option<String>,
    pub by_order_date: bool,
    pub from: Option<String>,
    pub to: Option<String>,
    pub order_type: Option<String>,
    pub q: Option<SearchTerm>,
}

impl ArchiveFilter {
    /// Bare dates in `from`/`to` cover whole days
    pub fn new(
        tenant_slug: String,
        archive_type: Option<String>,
        date_field: Option<&str>,
        from: Option<String>,
        to: Option<String>,
        order_type: Option<String>,
        q: Option<&str>,
    ) -> Self {
        Self {
            tenant_slug,
            archive_type,
            by_order_date: date_field.map(|f| f.trim().to_lowercase() == "order").unwrap_or(false),
            from: from.map(|d| expand_date_bound(&d, false)),
            to: to.map(|d| expand_date_bound(&d, true)),
            order_type,
            q: q.and_then(SearchTerm::parse),
        }
    }

    pub fn date_column(&self) -> &'static str {
        if self.by_order_date {
            "o.created_at"
        } else {
            "a.archived_at"
        }
    }

    /// `archives_<slug>_<arch|order>_<from>_<to>_<type|all>.csv`
    pub fn export_filename(&self) -> String {
        fn safe(s: &str) -> String {
            s.chars().filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_').collect()
        }
        fn date_part(d: &Option<String>) -> String {
            d.as_ref()
                .map(|d| d.chars().take(10).filter(|c| *c != 'T' && *c != ':').collect())
                .unwrap_or_else(|| "all".to_string())
        }
        let slug = if self.tenant_slug.is_empty() { "tenant" } else { &self.tenant_slug };
        format!(
            "archives_{}_{}_{}_{}_{}.csv",
            safe(slug),
            if self.by_order_date { "order" } else { "arch" },
            date_part(&self.from),
            date_part(&self.to),
            safe(self.archive_type.as_ref().map(String::as_str).unwrap_or("all"))
        )
    }
}

/// Archived order with its latest status change
#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct ArchiveEntry {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub created_at: String,
    #[diesel(sql_type = Text)]
    pub order_type: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub table_number: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub address_json: Option<String>,
    #[diesel(sql_type = Integer)]
    pub total: i32,
    #[diesel(sql_type = Text)]
    pub status: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub customer_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub customer_phone: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub last_status: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub last_change: Option<String>,
    #[serde(skip_serializing)]
    #[diesel(sql_type = Text)]
    pub archived_at: String,
    #[serde(skip_serializing)]
    #[diesel(sql_type = Nullable<Text>)]
    pub payment_status: Option<String>,
}

impl ArchiveEntry {
    pub fn destination(&self) -> String {
        if self.order_type == "mesa" {
            self.table_number.clone().unwrap_or_default()
        } else {
            self.address_json.clone().unwrap_or_default()
        }
    }

    /// Accent-insensitive match over address, table and customer name
    pub fn matches_folded(&self, folded: &str) -> bool {
        [&self.address_json, &self.table_number, &self.customer_name]
            .iter()
            .any(|field| fold_accents(field.as_ref().map(String::as_str).unwrap_or("")).contains(folded))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, QueryableByName)]
pub struct CountAndTotal {
    #[diesel(sql_type = BigInt)]
    pub count: i64,
    #[diesel(sql_type = BigInt)]
    pub total: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ArchiveMetrics {
    pub delivered_count: i64,
    pub delivered_total: i64,
    pub delivered_tip_10: i64,
    pub delivered_total_with_tip: i64,
    pub canceled_count: i64,
    pub canceled_total: i64,
}

/// Order that became eligible for the automatic archive
#[derive(Clone, Debug, PartialEq, QueryableByName)]
pub struct ArchiveCandidate {
    #[diesel(sql_type = Integer)]
    pub order_id: i32,
    #[diesel(sql_type = Text)]
    pub tenant_slug: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub delivered: usize,
    pub canceled: usize,
}

/// Timestamps of the first pass through each kitchen stage
#[derive(Clone, Debug, QueryableByName)]
pub struct StageTimes {
    #[diesel(sql_type = Text)]
    pub created_at: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub prep_at: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub listo_at: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub entregado_at: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StageAverages {
    pub avg_to_preparacion_min: i64,
    pub avg_to_listo_min: i64,
    pub avg_to_entregado_min: i64,
}

impl StageAverages {
    /// Floored whole minutes from creation, negatives count as zero
    pub fn compute(rows: &[StageTimes]) -> Self {
        fn avg<'a, I: Iterator<Item = (&'a String, Option<&'a String>)>>(pairs: I) -> i64 {
            let minutes: Vec<i64> = pairs
                .filter_map(|(created, at)| at.and_then(|at| minutes_between(created, at)))
                .map(|m| (m.floor() as i64).max(0))
                .collect();
            if minutes.is_empty() {
                0
            } else {
                minutes.iter().sum::<i64>() / minutes.len() as i64
            }
        }
        Self {
            avg_to_preparacion_min: avg(rows.iter().map(|r| (&r.created_at, r.prep_at.as_ref()))),
            avg_to_listo_min: avg(rows.iter().map(|r| (&r.created_at, r.listo_at.as_ref()))),
            avg_to_entregado_min: avg(rows.iter().map(|r| (&r.created_at, r.entregado_at.as_ref()))),
        }
    }
}

/// Dashboard counters
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub active_count: i64,
    pub delivered_count: i64,
    pub canceled_count: i64,
    pub delivered_total: i64,
    pub delivered_tip_10: i64,
    pub delivered_total_with_tip: i64,
    #[serde(flatten)]
    pub averages: StageAverages,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accents_are_folded() {
        assert_eq!(fold_accents("Peña Ñandú"), "pena nandu");
        assert_eq!(fold_accents("CAFÉ"), "cafe");
    }

    #[test]
    fn search_terms() {
        assert_eq!(SearchTerm::parse("42"), Some(SearchTerm::OrderId(42)));
        assert_eq!(SearchTerm::parse("  "), None);
        assert_eq!(
            SearchTerm::parse("Destino: Peña 10"),
            Some(SearchTerm::Text {
                like: "%peña 10%".to_string(),
                folded: "pena 10".to_string(),
            })
        );
        assert_eq!(strip_destination_prefix("dir:Mitre"), "Mitre");
        assert_eq!(strip_destination_prefix("directo"), "directo");
    }

    #[test]
    fn export_filename_is_sanitized() {
        let filter = ArchiveFilter::new(
            "mi local!".to_string(),
            None,
            Some("order"),
            Some("2024-03-01".to_string()),
            None,
            None,
            None,
        );
        assert_eq!(filter.from, Some("2024-03-01T00:00:00".to_string()));
        assert_eq!(filter.export_filename(), "archives_milocal_order_2024-03-01_all_all.csv");

        let filter = ArchiveFilter::new("local".to_string(), Some("delivered".to_string()), None, None, None, None, None);
        assert_eq!(filter.date_column(), "a.archived_at");
        assert_eq!(filter.export_filename(), "archives_local_arch_all_all_delivered.csv");
    }

    #[test]
    fn stage_averages_floor_and_clamp() {
        let rows = vec![
            StageTimes {
                created_at: "2024-03-01T10:00:00Z".to_string(),
                prep_at: Some("2024-03-01T10:05:59".to_string()),
                listo_at: Some("2024-03-01T09:00:00".to_string()),
                entregado_at: Some("2024-03-01T10:30:00".to_string()),
            },
            StageTimes {
                created_at: "2024-03-01T11:00:00Z".to_string(),
                prep_at: Some("2024-03-01T11:10:00".to_string()),
                listo_at: None,
                entregado_at: Some("2024-03-01T11:51:00".to_string()),
            },
        ];
        let averages = StageAverages::compute(&rows);
        assert_eq!(averages.avg_to_preparacion_min, (5 + 10) / 2);
        assert_eq!(averages.avg_to_listo_min, 0);
        assert_eq!(averages.avg_to_entregado_min, (30 + 51) / 2);
        assert_eq!(StageAverages::compute(&[]), StageAverages::default());
    }
}
