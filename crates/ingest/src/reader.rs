//! Incremental reads of append-only log files.
//!
//! Progress is tracked as a byte offset. After a seek to a nonzero offset the
//! first line is always discarded, since the offset may land inside a line that
//! was already consumed or was still being written. When the previous scan
//! ended exactly on a line boundary that discarded line was new and complete,
//! and its record is lost for good. Guessing at line boundaries would risk
//! double counting, so the loss is accepted.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;
use tracker_core::{FileState, IdentifiedRecord, truncate_to_millis};

use crate::parser::{parse_json_line, usage_from_value};
use crate::types::{IngestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// No prior state; read from the start.
    Fresh,
    Unchanged,
    /// Grew or was touched; resume from the stored offset.
    Incremental,
    /// Shrank below what was recorded; re-read from the start.
    Truncated,
}

/// Outcome of one read. `state` is only meant to be persisted after the
/// records have been imported.
#[derive(Debug, Clone)]
pub struct FileRead {
    pub file_id: String,
    pub mode: ReadMode,
    pub records: Vec<IdentifiedRecord>,
    pub state: FileState,
    pub bytes_read: u64,
    pub lines_read: u64,
    pub json_lines: u64,
}

pub fn file_id(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub(crate) fn mtime_of(metadata: &fs::Metadata) -> Option<DateTime<Utc>> {
    metadata
        .modified()
        .ok()
        .map(|time| truncate_to_millis(DateTime::<Utc>::from(time)))
}

pub fn classify(prior: Option<&FileState>, size: u64, mtime: Option<DateTime<Utc>>) -> ReadMode {
    let Some(prior) = prior else {
        return ReadMode::Fresh;
    };
    if size < prior.file_size || size < prior.byte_offset {
        return ReadMode::Truncated;
    }
    let mtime_advanced = match (mtime, prior.mtime) {
        (Some(current), Some(previous)) => current > previous,
        (_, None) => true,
        (None, Some(_)) => false,
    };
    if size > prior.file_size || mtime_advanced {
        ReadMode::Incremental
    } else {
        ReadMode::Unchanged
    }
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    line
}

/// Reads whatever was appended to `path` since `prior`.
pub fn read_new(path: &Path, prior: Option<&FileState>) -> Result<FileRead> {
    let file_id = file_id(path);
    let metadata = fs::metadata(path)?;
    let size = metadata.len();
    let mtime = mtime_of(&metadata);
    let mode = classify(prior, size, mtime);
    let state = FileState {
        file_id: file_id.clone(),
        byte_offset: size,
        file_size: size,
        mtime,
    };

    let start = match (mode, prior) {
        (ReadMode::Unchanged, Some(prior)) => {
            return Ok(FileRead {
                file_id,
                mode,
                records: Vec::new(),
                state: prior.clone(),
                bytes_read: 0,
                lines_read: 0,
                json_lines: 0,
            });
        }
        (ReadMode::Incremental, Some(prior)) => prior.byte_offset,
        _ => 0,
    };

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let mut reader = BufReader::new(file.take(size.saturating_sub(start)));
    let mut buf = Vec::new();
    let mut records = Vec::new();
    let mut bytes_read = 0u64;
    let mut lines_read = 0u64;
    let mut json_lines = 0u64;
    let mut skip_first = start > 0;

    loop {
        buf.clear();
        let bytes = reader.read_until(b'\n', &mut buf)?;
        if bytes == 0 {
            break;
        }
        bytes_read += bytes as u64;
        if skip_first {
            skip_first = false;
            continue;
        }
        let raw = trim_line_end(&buf);
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        // An unterminated tail may still be mid-write; it only counts once it parses.
        let terminated = buf.last() == Some(&b'\n');
        let obj = std::str::from_utf8(raw)
            .ok()
            .and_then(|line| parse_json_line(line).map(|obj| (line, obj)));
        if terminated || obj.is_some() {
            lines_read += 1;
        }
        let Some((line, obj)) = obj else {
            continue;
        };
        json_lines += 1;
        if let Some(record) = usage_from_value(&obj, line) {
            records.push(record);
        }
    }

    if lines_read > 0 && json_lines == 0 {
        return Err(IngestError::Parse {
            file_path: file_id,
            lines: lines_read,
        });
    }

    debug!(
        file = %file_id,
        ?mode,
        start,
        bytes_read,
        lines_read,
        records = records.len(),
        "read log file"
    );

    Ok(FileRead {
        file_id,
        mode,
        records,
        state,
        bytes_read,
        lines_read,
        json_lines,
    })
}
