use std::fmt::Write;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracker_core::{CompositeId, IdentifiedRecord, TokenCount, UsageRecord, truncate_to_millis};

const USAGE_EVENT_KIND: &str = "assistant";
const SYNTHETIC_MODEL: &str = "<synthetic>";

fn find_string<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    for path in paths {
        let mut current = value;
        let mut ok = true;
        for key in *path {
            if let Some(next) = current.get(*key) {
                current = next;
            } else {
                ok = false;
                break;
            }
        }
        if ok && let Some(found) = current.as_str() {
            return Some(found);
        }
    }
    None
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(truncate_to_millis(parsed.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(truncate_to_millis(parsed.and_utc()));
        }
    }
    None
}

fn token_field(usage: &Value, key: &str) -> u64 {
    usage.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn parse_token_count(usage: &Value) -> Option<TokenCount> {
    if !usage.is_object() {
        return None;
    }
    Some(TokenCount {
        input_tokens: token_field(usage, "input_tokens"),
        output_tokens: token_field(usage, "output_tokens"),
        cache_creation_tokens: token_field(usage, "cache_creation_input_tokens"),
        cache_read_tokens: token_field(usage, "cache_read_input_tokens"),
    })
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut out, "{:02x}", byte);
    }
    out
}

/// SHA-256 of the raw line, used as the id of lines that carry no ids.
pub fn hash_line(line: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(line.as_bytes());
    hex_digest(&hasher.finalize())
}

fn composite_id(obj: &Value, message: &Value, line: &str) -> CompositeId {
    let primary = non_empty(message.get("id").and_then(Value::as_str));
    let secondary = non_empty(find_string(obj, &[&["requestId"], &["request_id"]]));
    match (primary, secondary) {
        (Some(primary), Some(secondary)) => CompositeId::new(primary, secondary),
        _ => CompositeId::synthetic(hash_line(line)),
    }
}

pub(crate) fn parse_json_line(line: &str) -> Option<Value> {
    serde_json::from_str(line).ok()
}

pub(crate) fn usage_from_value(obj: &Value, line: &str) -> Option<IdentifiedRecord> {
    if obj.get("type")?.as_str()? != USAGE_EVENT_KIND {
        return None;
    }
    let message = obj.get("message")?;
    let model = non_empty(message.get("model").and_then(Value::as_str))?;
    if model == SYNTHETIC_MODEL {
        return None;
    }
    let usage = parse_token_count(message.get("usage")?)?;
    let timestamp = obj
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)?;
    Some(IdentifiedRecord {
        record: UsageRecord {
            model: model.to_string(),
            usage,
            timestamp,
        },
        id: composite_id(obj, message, line),
    })
}

/// Parses one log line; `None` for anything that is not a usage-bearing event.
pub fn parse_usage_line(line: &str) -> Option<IdentifiedRecord> {
    let obj = parse_json_line(line)?;
    usage_from_value(&obj, line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSISTANT_LINE: &str = r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00.123Z","requestId":"req_1","message":{"id":"msg_1","model":"claude-sonnet-4-5-20250929","usage":{"input_tokens":10,"output_tokens":20,"cache_creation_input_tokens":30,"cache_read_input_tokens":40}}}"#;

    #[test]
    fn parses_assistant_usage_line() {
        let parsed = parse_usage_line(ASSISTANT_LINE).expect("record");
        assert_eq!(parsed.record.model, "claude-sonnet-4-5-20250929");
        assert_eq!(
            parsed.record.usage,
            TokenCount {
                input_tokens: 10,
                output_tokens: 20,
                cache_creation_tokens: 30,
                cache_read_tokens: 40,
            }
        );
        assert_eq!(
            parsed.record.timestamp.to_rfc3339(),
            "2025-06-01T10:00:00.123+00:00"
        );
        assert_eq!(parsed.id.key(), "msg_1:req_1");
        assert!(!parsed.id.synthetic);
    }

    #[test]
    fn accepts_snake_case_request_id() {
        let line = r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","request_id":"req_9","message":{"id":"msg_9","model":"claude-haiku-4-5","usage":{"input_tokens":1}}}"#;
        let parsed = parse_usage_line(line).expect("record");
        assert_eq!(parsed.id.key(), "msg_9:req_9");
        assert_eq!(parsed.record.usage.output_tokens, 0);
    }

    #[test]
    fn missing_ids_fall_back_to_line_digest() {
        let line = r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","message":{"id":"msg_1","model":"claude-haiku-4-5","usage":{"input_tokens":1}}}"#;
        let parsed = parse_usage_line(line).expect("record");
        let digest = hash_line(line);
        assert!(parsed.id.synthetic);
        assert_eq!(parsed.id.primary_id, digest);
        assert_eq!(parsed.id.secondary_id, digest);
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn timestamps_without_fraction_or_zone_parse() {
        assert!(parse_timestamp("2025-06-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2025-06-01T10:00:00+02:00").is_some());
        let naive = parse_timestamp("2025-06-01T10:00:00.5").expect("naive");
        assert_eq!(naive.to_rfc3339(), "2025-06-01T10:00:00.500+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn drops_irrelevant_or_incomplete_lines() {
        let lines = [
            r#"{"type":"user","timestamp":"2025-06-01T10:00:00Z","message":{"role":"user","content":"hi"}}"#,
            r#"{"type":"summary","summary":"chat","leafUuid":"x"}"#,
            r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","message":{"model":"claude-haiku-4-5"}}"#,
            r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","message":{"usage":{"input_tokens":1}}}"#,
            r#"{"type":"assistant","message":{"model":"claude-haiku-4-5","usage":{"input_tokens":1}}}"#,
            r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","message":{"model":"<synthetic>","usage":{"input_tokens":0}}}"#,
            r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","message":{"model":"claude-haiku-4-5","usage":null}}"#,
            r#"{"type":"assistant","#,
            "not json at all",
        ];
        for line in lines {
            assert!(parse_usage_line(line).is_none(), "accepted {}", line);
        }
    }

    #[test]
    fn negative_or_fractional_counts_default_to_zero() {
        let line = r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","requestId":"r","message":{"id":"m","model":"claude-haiku-4-5","usage":{"input_tokens":-5,"output_tokens":2.5,"cache_read_input_tokens":7}}}"#;
        let parsed = parse_usage_line(line).expect("record");
        assert_eq!(parsed.record.usage.input_tokens, 0);
        assert_eq!(parsed.record.usage.output_tokens, 0);
        assert_eq!(parsed.record.usage.cache_read_tokens, 7);
    }
}
