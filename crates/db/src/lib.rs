mod analytics;
mod error;
mod file_state;
mod helpers;
mod import;
mod migrations;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

pub use error::{DbError, Result};
pub use file_state::SweepStats;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One SQLite connection. The importer and the querier each hold their own, so
/// WAL snapshot reads never wait on an open write transaction.
pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }
}
