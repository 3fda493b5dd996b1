//! Rewrites the SQLite flavoured SQL used across the repos into the dialect of the
//! connected backend.

use std::fmt;

/// Database engine behind a connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Backend::Postgres
        } else {
            Backend::Sqlite
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Backend::Postgres => write!(f, "postgres"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Strips the optional `sqlite://` scheme from a database url
pub fn sqlite_path(url: &str) -> &str {
    if url.starts_with("sqlite://") {
        &url["sqlite://".len()..]
    } else {
        url
    }
}

/// Translates a statement written with `?` placeholders and SQLite idioms.
///
/// SQLite statements pass through untouched.
pub fn translate(backend: Backend, sql: &str) -> String {
    match backend {
        Backend::Sqlite => sql.to_string(),
        Backend::Postgres => {
            let mut q = numbered_placeholders(sql);
            if q.contains("INTEGER PRIMARY KEY AUTOINCREMENT") {
                q = q.replace("INTEGER PRIMARY KEY AUTOINCREMENT", "SERIAL PRIMARY KEY");
            }
            if q.contains("INSERT OR IGNORE") {
                q = q.replace("INSERT OR IGNORE", "INSERT");
                q.push_str(" ON CONFLICT DO NOTHING");
            }
            if q.contains("INSERT OR REPLACE INTO tenant_config") {
                q = q.replace("INSERT OR REPLACE INTO", "INSERT INTO");
                q.push_str(" ON CONFLICT (tenant_slug) DO UPDATE SET config_json = EXCLUDED.config_json");
            }
            q
        }
    }
}

/// `?` becomes `$1`, `$2`, ... ; question marks inside quoted literals are kept
fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                _ => out.push(c),
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_is_untouched() {
        let sql = "INSERT OR IGNORE INTO products (tenant_slug) VALUES (?)";
        assert_eq!(translate(Backend::Sqlite, sql), sql);
    }

    #[test]
    fn placeholders_are_numbered_outside_literals() {
        let sql = "SELECT * FROM orders WHERE tenant_slug = ? AND note = '?' AND id = ?";
        assert_eq!(
            translate(Backend::Postgres, sql),
            "SELECT * FROM orders WHERE tenant_slug = $1 AND note = '?' AND id = $2"
        );
    }

    #[test]
    fn insert_or_ignore_becomes_on_conflict() {
        let sql = "INSERT OR IGNORE INTO archived_orders (order_id, type) VALUES (?, ?)";
        assert_eq!(
            translate(Backend::Postgres, sql),
            "INSERT INTO archived_orders (order_id, type) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn tenant_config_replace_becomes_upsert() {
        let sql = "INSERT OR REPLACE INTO tenant_config (tenant_slug, config_json) VALUES (?, ?)";
        assert_eq!(
            translate(Backend::Postgres, sql),
            "INSERT INTO tenant_config (tenant_slug, config_json) VALUES ($1, $2) \
             ON CONFLICT (tenant_slug) DO UPDATE SET config_json = EXCLUDED.config_json"
        );
    }

    #[test]
    fn autoincrement_becomes_serial() {
        let sql = "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)";
        assert_eq!(translate(Backend::Postgres, sql), "CREATE TABLE t (id SERIAL PRIMARY KEY, name TEXT)");
    }

    #[test]
    fn backend_is_picked_from_url() {
        assert_eq!(Backend::from_url("postgres://u@h/db"), Backend::Postgres);
        assert_eq!(Backend::from_url("postgresql://u@h/db"), Backend::Postgres);
        assert_eq!(Backend::from_url("orders.db"), Backend::Sqlite);
        assert_eq!(sqlite_path("sqlite://orders.db"), "orders.db");
    }
}
