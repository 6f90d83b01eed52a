use rusqlite::{TransactionBehavior, params};
use tracing::debug;
use tracker_core::{IdentifiedRecord, PricingTable};

use crate::Db;
use crate::error::Result;
use crate::helpers::{format_ts, row_to_token_count, to_sql_count};

impl Db {
    /// Stores every record whose composite id is not yet present, pricing it
    /// once with the first matching rule. The batch commits or rolls back as a
    /// whole, and re-importing the same batch inserts nothing.
    ///
    /// The write lock is taken up front: a deferred transaction that has
    /// already read cannot wait out a busy writer.
    pub fn import_usage_records(
        &mut self,
        batch: &[IdentifiedRecord],
        pricing: &PricingTable,
    ) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0usize;
        {
            let mut exists_stmt = tx.prepare("SELECT 1 FROM usage_record WHERE id = ?1")?;
            let mut insert_stmt = tx.prepare(
                r#"
                INSERT INTO usage_record (
                  id, ts, model, input_tokens, output_tokens,
                  cache_creation_tokens, cache_read_tokens, cost_usd
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for item in batch {
                let id = item.id.key();
                if exists_stmt.exists(params![id])? {
                    continue;
                }
                let record = &item.record;
                let cost = pricing.cost_for(&record.model, record.usage);
                insert_stmt.execute(params![
                    id,
                    format_ts(&record.timestamp),
                    record.model,
                    to_sql_count(record.usage.input_tokens),
                    to_sql_count(record.usage.output_tokens),
                    to_sql_count(record.usage.cache_creation_tokens),
                    to_sql_count(record.usage.cache_read_tokens),
                    cost,
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;
        debug!(batch = batch.len(), inserted, "imported usage records");
        Ok(inserted)
    }

    /// Reprices every stored record with `pricing`. Returns how many costs changed.
    pub fn backfill_costs(&mut self, pricing: &PricingTable) -> Result<usize> {
        let rows = {
            let mut stmt = self.conn.prepare(
                r#"
                SELECT id, model, input_tokens, output_tokens,
                       cache_creation_tokens, cache_read_tokens, cost_usd
                FROM usage_record
                "#,
            )?;
            let rows = stmt.query_map([], |row| {
                let id: String = row.get(0)?;
                let model: String = row.get(1)?;
                let usage = row_to_token_count(row, 2)?;
                let cost: f64 = row.get(6)?;
                Ok((id, model, usage, cost))
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut updated = 0usize;
        {
            let mut stmt = tx.prepare("UPDATE usage_record SET cost_usd = ?1 WHERE id = ?2")?;
            for (id, model, usage, current) in rows {
                let cost = pricing.cost_for(&model, usage);
                if (cost - current).abs() <= f64::EPSILON {
                    continue;
                }
                stmt.execute(params![cost, id])?;
                updated += 1;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    pub fn count_usage_records(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM usage_record", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}
