use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::info;
use tracker_core::FileState;

use crate::Db;
use crate::error::Result;
use crate::helpers::{format_ts, row_to_file_state, to_sql_count};

/// Rows removed by one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub records_deleted: usize,
    pub file_states_deleted: usize,
}

impl Db {
    pub fn list_file_states(&self) -> Result<HashMap<String, FileState>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT file_id, byte_offset, file_size, mtime
            FROM file_state
            "#,
        )?;
        let rows = stmt.query_map([], row_to_file_state)?;
        let mut states = HashMap::new();
        for row in rows {
            let state = row?;
            states.insert(state.file_id.clone(), state);
        }
        Ok(states)
    }

    pub fn get_file_state(&self, file_id: &str) -> Result<Option<FileState>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT file_id, byte_offset, file_size, mtime
                FROM file_state
                WHERE file_id = ?1
                "#,
                params![file_id],
                row_to_file_state,
            )
            .optional()?)
    }

    pub fn upsert_file_state(&self, state: &FileState) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO file_state (file_id, byte_offset, file_size, mtime, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(file_id) DO UPDATE SET
              byte_offset = excluded.byte_offset,
              file_size = excluded.file_size,
              mtime = excluded.mtime,
              updated_at = excluded.updated_at
            "#,
            params![
                state.file_id,
                to_sql_count(state.byte_offset),
                to_sql_count(state.file_size),
                state.mtime.as_ref().map(format_ts),
                format_ts(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Re-baselines a file to offset 0 so the next read starts from the top.
    pub fn reset_file_state(&self, file_id: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO file_state (file_id, byte_offset, file_size, mtime, updated_at)
            VALUES (?1, 0, 0, NULL, ?2)
            ON CONFLICT(file_id) DO UPDATE SET
              byte_offset = 0,
              file_size = 0,
              mtime = NULL,
              updated_at = excluded.updated_at
            "#,
            params![file_id, format_ts(&Utc::now())],
        )?;
        Ok(())
    }

    /// Deletes records older than `horizon` together with the state of files
    /// last modified before it. Safe to repeat.
    pub fn sweep_older_than(&mut self, horizon: DateTime<Utc>) -> Result<SweepStats> {
        let cutoff = format_ts(&horizon);
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let records_deleted =
            tx.execute("DELETE FROM usage_record WHERE ts < ?1", params![cutoff])?;
        let file_states_deleted = tx.execute(
            "DELETE FROM file_state WHERE mtime IS NOT NULL AND mtime < ?1",
            params![cutoff],
        )?;
        tx.commit()?;
        let stats = SweepStats {
            records_deleted,
            file_states_deleted,
        };
        if records_deleted > 0 || file_states_deleted > 0 {
            info!(
                records_deleted,
                file_states_deleted,
                horizon = %cutoff,
                "retention sweep removed rows"
            );
        }
        Ok(stats)
    }
}
