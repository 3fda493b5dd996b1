use diesel::sql_types::BigInt;
use diesel::QueryableByName;

use super::error::Error as RepoError;

pub type RepoResult<T> = Result<T, RepoError>;

/// Single `COUNT(*) AS count` row
#[derive(Clone, Copy, Debug, QueryableByName)]
pub struct RowCount {
    #[diesel(sql_type = BigInt)]
    pub count: i64,
}

/// Subquery joining each order to its latest history row with a given status, as `h.last_change`.
/// Takes the status as its only parameter.
pub const LATEST_CHANGE_JOIN: &str = "JOIN (SELECT order_id, MAX(changed_at) AS last_change FROM order_status_history \
     WHERE status = ? GROUP BY order_id) h ON h.order_id = o.id";
