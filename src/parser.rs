//! Decoder for VQL response payloads.
//!
//! Each `VQLResponse` message carries one batch of rows. Older servers fill
//! the `Response` field with a JSON array; newer ones may also (or instead)
//! fill `JSONLResponse` with one JSON object per line. Both decode to the
//! same `Vec<Record>`.

use crate::error::Result;
use crate::proto::VqlResponse;
use crate::types::Record;

/// Decode a JSON array payload into records.
///
/// An empty or whitespace-only payload is an empty batch, not an error.
pub fn parse_batch(payload: &str) -> Result<Vec<Record>> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(payload)?)
}

/// Decode a JSON-lines payload into records.
pub fn parse_jsonl(payload: &str) -> Result<Vec<Record>> {
    payload
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

/// Decode the rows carried by one response message.
///
/// Returns `None` for messages with no row payload (log lines, keepalives).
pub fn parse_response(message: &VqlResponse) -> Option<Result<Vec<Record>>> {
    if !message.response.is_empty() {
        Some(parse_batch(&message.response))
    } else if !message.jsonl_response.is_empty() {
        Some(parse_jsonl(&message.jsonl_response))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_parse_batch_single_record() {
        let records = parse_batch(r#"[{"ok": true}]"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], Record::new().with("ok", true));
    }

    #[test]
    fn test_parse_batch_empty() {
        assert!(parse_batch("").unwrap().is_empty());
        assert!(parse_batch("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_batch_rejects_non_array() {
        assert!(parse_batch(r#"{"ok": true}"#).is_err());
        assert!(parse_batch("[1, 2]").is_err());
    }

    #[test]
    fn test_parse_jsonl() {
        let records = parse_jsonl("{\"a\": 1}\n\n{\"a\": 2}\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("a"), Some(&Value::Long(2)));
    }

    #[test]
    fn test_parse_response_prefers_json_array() {
        let message = VqlResponse {
            response: r#"[{"a": 1}]"#.to_string(),
            jsonl_response: "{\"a\": 1}\n{\"a\": 2}\n".to_string(),
            ..Default::default()
        };
        let records = parse_response(&message).unwrap().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_response_log_only() {
        let message = VqlResponse {
            log: "Starting query execution".to_string(),
            ..Default::default()
        };
        assert!(parse_response(&message).is_none());
    }
}
