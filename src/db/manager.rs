use diesel::r2d2::Error as PoolError;
use diesel::ConnectionError;
use r2d2::ManageConnection;

use super::connection::DbConnection;

/// r2d2 manager producing backend-neutral connections from a database url
#[derive(Clone, Debug)]
pub struct DbConnectionManager {
    database_url: String,
}

impl DbConnectionManager {
    pub fn new<S: Into<String>>(database_url: S) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

impl ManageConnection for DbConnectionManager {
    type Connection = DbConnection;
    type Error = PoolError;

    fn connect(&self) -> Result<DbConnection, PoolError> {
        DbConnection::establish(&self.database_url).map_err(|e: ConnectionError| PoolError::ConnectionError(e))
    }

    fn is_valid(&self, conn: &mut DbConnection) -> Result<(), PoolError> {
        conn.batch_execute("SELECT 1").map_err(PoolError::QueryError)
    }

    fn has_broken(&self, conn: &mut DbConnection) -> bool {
        conn.is_broken()
    }
}
