use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use tracker_core::{FileState, PersistedUsageRecord, TokenCount};

/// Millisecond RFC 3339 in UTC, so text order is time order.
pub(crate) fn format_ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

fn parse_optional_ts_column(
    row: &Row<'_>,
    index: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
            })
    })
    .transpose()
}

pub(crate) fn row_to_token_count(row: &Row<'_>, first: usize) -> rusqlite::Result<TokenCount> {
    Ok(TokenCount {
        input_tokens: row.get::<_, i64>(first)?.max(0) as u64,
        output_tokens: row.get::<_, i64>(first + 1)?.max(0) as u64,
        cache_creation_tokens: row.get::<_, i64>(first + 2)?.max(0) as u64,
        cache_read_tokens: row.get::<_, i64>(first + 3)?.max(0) as u64,
    })
}

/// Expects `id, ts, model, input, output, cache_creation, cache_read, cost_usd`.
pub(crate) fn row_to_persisted_record(row: &Row<'_>) -> rusqlite::Result<PersistedUsageRecord> {
    Ok(PersistedUsageRecord {
        id: row.get(0)?,
        timestamp: parse_ts_column(row, 1)?,
        model: row.get(2)?,
        usage: row_to_token_count(row, 3)?,
        cost_usd: row.get(7)?,
    })
}

/// Expects `file_id, byte_offset, file_size, mtime`.
pub(crate) fn row_to_file_state(row: &Row<'_>) -> rusqlite::Result<FileState> {
    Ok(FileState {
        file_id: row.get(0)?,
        byte_offset: row.get::<_, i64>(1)?.max(0) as u64,
        file_size: row.get::<_, i64>(2)?.max(0) as u64,
        mtime: parse_optional_ts_column(row, 3)?,
    })
}

pub(crate) fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
