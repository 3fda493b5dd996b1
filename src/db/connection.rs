//! Backend-neutral connection. Repos talk to it with `?` placeholders and typed params,
//! the connection rewrites and binds them for whatever engine is behind it.

use std::cell::{Cell, RefCell};

use diesel::connection::SimpleConnection;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::result::{ConnectionResult, Error as DieselError, QueryResult};
use diesel::sql_query;
use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use diesel::sqlite::{Sqlite, SqliteConnection};

use super::dialect::{sqlite_path, translate, Backend};

/// Statement parameter, typed so Postgres gets the right oid for nulls as well
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Int(i32),
    BigInt(i64),
    Text(String),
    OptInt(Option<i32>),
    OptText(Option<String>),
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(v)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::BigInt(v)
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl<'a> From<&'a str> for Param {
    fn from(v: &'a str) -> Self {
        Param::Text(v.to_string())
    }
}

impl<'a> From<&'a String> for Param {
    fn from(v: &'a String) -> Self {
        Param::Text(v.clone())
    }
}

impl From<Option<i32>> for Param {
    fn from(v: Option<i32>) -> Self {
        Param::OptInt(v)
    }
}

impl From<Option<String>> for Param {
    fn from(v: Option<String>) -> Self {
        Param::OptText(v)
    }
}

/// Builds a `Vec<Param>` from heterogeneous values
#[macro_export]
macro_rules! params {
    () => {
        Vec::<$crate::db::Param>::new()
    };
    ($($value:expr),+ $(,)*) => {
        vec![$($crate::db::Param::from($value)),+]
    };
}

macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params.iter().cloned() {
            query = match param {
                Param::Int(v) => query.bind::<Integer, _>(v),
                Param::BigInt(v) => query.bind::<BigInt, _>(v),
                Param::Text(v) => query.bind::<Text, _>(v),
                Param::OptInt(v) => query.bind::<Nullable<Integer>, _>(v),
                Param::OptText(v) => query.bind::<Nullable<Text>, _>(v),
            };
        }
        query
    }};
}

#[derive(QueryableByName)]
struct InsertedId {
    #[diesel(sql_type = Integer)]
    id: i32,
}

enum RawConnection {
    Postgres(PgConnection),
    Sqlite(SqliteConnection),
}

pub struct DbConnection {
    backend: Backend,
    raw: RefCell<RawConnection>,
    depth: Cell<u32>,
    broken: Cell<bool>,
}

impl DbConnection {
    pub fn establish(database_url: &str) -> ConnectionResult<Self> {
        let backend = Backend::from_url(database_url);
        let raw = match backend {
            Backend::Postgres => RawConnection::Postgres(PgConnection::establish(database_url)?),
            Backend::Sqlite => {
                let mut conn = SqliteConnection::establish(sqlite_path(database_url))?;
                conn.batch_execute("PRAGMA busy_timeout = 5000;")
                    .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;
                RawConnection::Sqlite(conn)
            }
        };
        Ok(Self {
            backend,
            raw: RefCell::new(raw),
            depth: Cell::new(0),
            broken: Cell::new(false),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Runs a query and maps every row by column name
    pub fn load<T>(&self, sql: &str, params: &[Param]) -> QueryResult<Vec<T>>
    where
        T: QueryableByName<Pg> + QueryableByName<Sqlite> + 'static,
    {
        let q = translate(self.backend, sql);
        trace!("{} load: {} {:?}", self.backend, q, params);
        match *self.raw.borrow_mut() {
            RawConnection::Postgres(ref mut conn) => bind_params!(sql_query(q).into_boxed::<Pg>(), params).load::<T>(conn),
            RawConnection::Sqlite(ref mut conn) => bind_params!(sql_query(q).into_boxed::<Sqlite>(), params).load::<T>(conn),
        }
    }

    pub fn load_one<T>(&self, sql: &str, params: &[Param]) -> QueryResult<Option<T>>
    where
        T: QueryableByName<Pg> + QueryableByName<Sqlite> + 'static,
    {
        self.load(sql, params).map(|rows| rows.into_iter().next())
    }

    /// Runs a statement, returns the number of affected rows
    pub fn execute(&self, sql: &str, params: &[Param]) -> QueryResult<usize> {
        let q = translate(self.backend, sql);
        trace!("{} execute: {} {:?}", self.backend, q, params);
        match *self.raw.borrow_mut() {
            RawConnection::Postgres(ref mut conn) => bind_params!(sql_query(q).into_boxed::<Pg>(), params).execute(conn),
            RawConnection::Sqlite(ref mut conn) => bind_params!(sql_query(q).into_boxed::<Sqlite>(), params).execute(conn),
        }
    }

    /// Runs an `INSERT` into a table with an `id` column and returns the new id,
    /// `None` when the row was skipped by `INSERT OR IGNORE`
    pub fn insert(&self, sql: &str, params: &[Param]) -> QueryResult<Option<i32>> {
        match self.backend {
            Backend::Postgres => {
                let mut q = translate(Backend::Postgres, sql);
                if !q.to_uppercase().contains("RETURNING") {
                    q.push_str(" RETURNING id");
                }
                trace!("postgres insert: {} {:?}", q, params);
                let rows = match *self.raw.borrow_mut() {
                    RawConnection::Postgres(ref mut conn) => {
                        bind_params!(sql_query(q).into_boxed::<Pg>(), params).load::<InsertedId>(conn)?
                    }
                    RawConnection::Sqlite(_) => return Err(DieselError::BrokenTransactionManager),
                };
                Ok(rows.into_iter().next().map(|row| row.id))
            }
            Backend::Sqlite => {
                let affected = self.execute(sql, params)?;
                if affected == 0 {
                    return Ok(None);
                }
                let row: Option<InsertedId> = self.load_one("SELECT CAST(last_insert_rowid() AS INTEGER) AS id", &[])?;
                Ok(row.map(|row| row.id))
            }
        }
    }

    /// Runs several `;` separated statements without params
    pub fn batch_execute(&self, sql: &str) -> QueryResult<()> {
        let q = translate(self.backend, sql);
        match *self.raw.borrow_mut() {
            RawConnection::Postgres(ref mut conn) => conn.batch_execute(&q),
            RawConnection::Sqlite(ref mut conn) => conn.batch_execute(&q),
        }
    }

    /// Runs `f` inside a transaction, nested calls use savepoints.
    /// Any `Err` returned by `f` rolls back everything done inside, and so does a panic
    /// unwinding out of `f` or a failed commit.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<DieselError>,
    {
        let mut level = TransactionLevel::begin(self)?;
        match f() {
            Ok(value) => {
                level.commit()?;
                Ok(value)
            }
            Err(e) => {
                level.rollback();
                Err(e)
            }
        }
    }

    /// A connection left inside a transaction or after a failed rollback must not go back to the pool
    pub fn is_broken(&self) -> bool {
        self.depth.get() != 0 || self.broken.get()
    }

    /// Column names of a table, used to backfill columns on legacy databases
    pub fn table_columns(&self, table: &str) -> QueryResult<Vec<String>> {
        #[derive(QueryableByName)]
        struct ColumnName {
            #[diesel(sql_type = Text)]
            name: String,
        }

        let rows: Vec<ColumnName> = match self.backend {
            Backend::Sqlite => self.load(&format!("SELECT name FROM pragma_table_info('{}')", table), &[])?,
            Backend::Postgres => self.load(
                "SELECT CAST(column_name AS TEXT) AS name FROM information_schema.columns WHERE table_name = ?",
                &params![table],
            )?,
        };
        Ok(rows.into_iter().map(|row| row.name).collect())
    }
}

/// One open `BEGIN` or savepoint. Dropping it unfinished, as happens when the closure
/// panics, rolls it back.
struct TransactionLevel<'a> {
    conn: &'a DbConnection,
    depth: u32,
    finished: bool,
}

impl<'a> TransactionLevel<'a> {
    fn begin(conn: &'a DbConnection) -> QueryResult<Self> {
        let depth = conn.depth.get();
        if depth == 0 {
            conn.batch_execute("BEGIN")?;
        } else {
            conn.batch_execute(&format!("SAVEPOINT gastro_sp_{}", depth))?;
        }
        conn.depth.set(depth + 1);
        Ok(Self {
            conn,
            depth,
            finished: false,
        })
    }

    fn commit(&mut self) -> QueryResult<()> {
        let committed = if self.depth == 0 {
            self.conn.batch_execute("COMMIT")
        } else {
            self.conn.batch_execute(&format!("RELEASE SAVEPOINT gastro_sp_{}", self.depth))
        };
        match committed {
            Ok(()) => {
                self.finish();
                Ok(())
            }
            Err(e) => {
                warn!("Commit at depth {} failed, rolling back: {}", self.depth, e);
                self.rollback();
                Err(e)
            }
        }
    }

    fn rollback(&mut self) {
        let rolled_back = if self.depth == 0 {
            self.conn.batch_execute("ROLLBACK")
        } else {
            self.conn
                .batch_execute(&format!("ROLLBACK TO SAVEPOINT gastro_sp_{0}; RELEASE SAVEPOINT gastro_sp_{0}", self.depth))
        };
        if let Err(e) = rolled_back {
            error!("Failed to roll back transaction: {}", e);
            self.conn.broken.set(true);
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.conn.depth.set(self.depth);
        self.finished = true;
    }
}

impl<'a> Drop for TransactionLevel<'a> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Transaction at depth {} abandoned, rolling back", self.depth);
            self.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;

    #[derive(QueryableByName, Debug, PartialEq)]
    struct Row {
        #[diesel(sql_type = Integer)]
        id: i32,
        #[diesel(sql_type = Nullable<Text>)]
        name: Option<String>,
    }

    fn conn() -> (tempfile::TempDir, DbConnection) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conn.db");
        let conn = DbConnection::establish(path.to_str().unwrap()).unwrap();
        conn.batch_execute("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)").unwrap();
        (dir, conn)
    }

    #[test]
    fn insert_returns_new_ids() {
        let (_dir, conn) = conn();
        let first = conn.insert("INSERT INTO t (name) VALUES (?)", &params!["a"]).unwrap();
        let second = conn.insert("INSERT INTO t (name) VALUES (?)", &params![None::<String>]).unwrap();
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));

        let rows: Vec<Row> = conn.load("SELECT id, name FROM t ORDER BY id", &[]).unwrap();
        assert_eq!(rows[1], Row { id: 2, name: None });
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let (_dir, conn) = conn();
        let result: Result<(), DieselError> = conn.transaction(|| {
            conn.insert("INSERT INTO t (name) VALUES (?)", &params!["a"])?;
            Err(DieselError::RollbackTransaction)
        });
        assert!(result.is_err());
        let rows: Vec<Row> = conn.load("SELECT id, name FROM t", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn nested_transaction_uses_savepoint() {
        let (_dir, conn) = conn();
        let result: Result<(), DieselError> = conn.transaction(|| {
            conn.insert("INSERT INTO t (name) VALUES (?)", &params!["outer"])?;
            let inner: Result<(), DieselError> = conn.transaction(|| {
                conn.insert("INSERT INTO t (name) VALUES (?)", &params!["inner"])?;
                Err(DieselError::RollbackTransaction)
            });
            assert!(inner.is_err());
            Ok(())
        });
        assert!(result.is_ok());
        let rows: Vec<Row> = conn.load("SELECT id, name FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, Some("outer".to_string()));
    }

    #[test]
    fn panic_inside_transaction_rolls_back_and_releases_the_lock() {
        let (dir, conn) = conn();
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), DieselError> = conn.transaction(|| {
                conn.insert("INSERT INTO t (name) VALUES (?)", &params!["lost"])?;
                panic!("boom");
            });
        }));
        assert!(unwound.is_err());
        assert!(!conn.is_broken());

        let other = DbConnection::establish(dir.path().join("conn.db").to_str().unwrap()).unwrap();
        other.execute("INSERT INTO t (name) VALUES (?)", &params!["other"]).unwrap();

        let result: Result<(), DieselError> = conn.transaction(|| {
            conn.insert("INSERT INTO t (name) VALUES (?)", &params!["kept"])?;
            Ok(())
        });
        assert!(result.is_ok());
        let rows: Vec<Row> = other.load("SELECT id, name FROM t ORDER BY id", &[]).unwrap();
        let names: Vec<Option<String>> = rows.into_iter().map(|row| row.name).collect();
        assert_eq!(names, vec![Some("other".to_string()), Some("kept".to_string())]);
    }

    #[test]
    fn open_transaction_marks_the_connection_broken() {
        let (_dir, conn) = conn();
        let result: Result<(), DieselError> = conn.transaction(|| {
            assert!(conn.is_broken());
            Ok(())
        });
        assert!(result.is_ok());
        assert!(!conn.is_broken());
    }

    #[test]
    fn failed_commit_is_reported() {
        let (_dir, conn) = conn();
        let result: Result<(), DieselError> = conn.transaction(|| {
            conn.insert("INSERT INTO t (name) VALUES (?)", &params!["a"])?;
            conn.batch_execute("COMMIT")
        });
        assert!(result.is_err());
        assert!(conn.is_broken());
    }

    #[test]
    fn table_columns_lists_sqlite_columns() {
        let (_dir, conn) = conn();
        assert_eq!(conn.table_columns("t").unwrap(), vec!["id".to_string(), "name".to_string()]);
    }
}
