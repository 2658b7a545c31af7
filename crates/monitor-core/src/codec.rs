//! State-file codec for [`SessionRecord`].
//!
//! Decoding is lenient: only `session_id` is mandatory. Every other field
//! falls back to a default when it is missing or has the wrong type.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::{Map, Value};

use crate::error::{MonitorError, Result};
use crate::models::{SessionRecord, SessionStatus, TerminalKind, DEFAULT_PROJECT};

/// Decode one state file.
pub fn decode(bytes: &[u8]) -> Result<SessionRecord> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Object(obj) = value else {
        return Err(MonitorError::Decode(
            "state file is not a JSON object".to_string(),
        ));
    };

    let session_id = match obj.get("session_id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) => {
            return Err(MonitorError::Decode("session_id is empty".to_string()))
        }
        Some(_) => {
            return Err(MonitorError::Decode(
                "session_id is not a string".to_string(),
            ))
        }
        None => return Err(MonitorError::Decode("missing session_id".to_string())),
    };

    Ok(SessionRecord {
        session_id,
        status: str_field(&obj, "status")
            .map(SessionStatus::from_wire)
            .unwrap_or(SessionStatus::Unknown),
        project: str_field(&obj, "project")
            .unwrap_or(DEFAULT_PROJECT)
            .to_string(),
        cwd: string_or_empty(&obj, "cwd"),
        terminal: str_field(&obj, "terminal")
            .map(TerminalKind::from_wire)
            .unwrap_or(TerminalKind::Unknown),
        terminal_session_id: string_or_empty(&obj, "terminal_session_id"),
        started_at: str_field(&obj, "started_at").and_then(parse_timestamp),
        updated_at: str_field(&obj, "updated_at").and_then(parse_timestamp),
        last_prompt: string_or_empty(&obj, "last_prompt"),
    })
}

/// Encode a record as a pretty-printed JSON object carrying all nine fields.
pub fn encode(record: &SessionRecord) -> Result<Vec<u8>> {
    let value = serde_json::json!({
        "session_id": record.session_id,
        "status": record.status.as_str(),
        "project": record.project,
        "cwd": record.cwd,
        "terminal": record.terminal.as_str(),
        "terminal_session_id": record.terminal_session_id,
        "started_at": format_timestamp(record.started_at),
        "updated_at": format_timestamp(record.updated_at),
        "last_prompt": record.last_prompt,
    });
    let mut bytes = serde_json::to_vec_pretty(&value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse an RFC 3339 timestamp, with or without fractional seconds.
///
/// Naive timestamps (no offset) are read as UTC. Empty or unparseable input
/// yields `None`.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    tracing::debug!(timestamp = s, "ignoring unparseable timestamp");
    None
}

fn format_timestamp(ts: Option<DateTime<FixedOffset>>) -> String {
    ts.map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn string_or_empty(obj: &Map<String, Value>, key: &str) -> String {
    str_field(obj, key).unwrap_or_default().to_string()
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> SessionRecord {
        SessionRecord {
            session_id: "8f1c2a".to_string(),
            status: SessionStatus::Attention,
            project: "registry".to_string(),
            cwd: "/Users/dev/registry".to_string(),
            terminal: TerminalKind::Device,
            terminal_session_id: "/dev/ttys004".to_string(),
            started_at: parse_timestamp("2024-05-01T10:00:00Z"),
            updated_at: parse_timestamp("2024-05-01T10:03:12.250+02:00"),
            last_prompt: "fix the \"flaky\" test\nplease".to_string(),
        }
    }

    #[test]
    fn test_encode_decode_preserves_fields() {
        let record = full_record();
        let decoded = decode(&encode(&record).unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(
            decoded.updated_at.unwrap().offset().local_minus_utc(),
            2 * 3600,
            "timezone offset must survive"
        );
    }

    #[test]
    fn test_decode_minimal_record_uses_defaults() {
        let decoded = decode(br#"{"session_id":"abc"}"#).unwrap();
        assert_eq!(decoded.session_id, "abc");
        assert_eq!(decoded.status, SessionStatus::Unknown);
        assert_eq!(decoded.project, "unknown");
        assert_eq!(decoded.cwd, "");
        assert_eq!(decoded.terminal, TerminalKind::Unknown);
        assert_eq!(decoded.terminal_session_id, "");
        assert!(decoded.started_at.is_none());
        assert!(decoded.updated_at.is_none());
        assert_eq!(decoded.last_prompt, "");
    }

    #[test]
    fn test_decode_missing_session_id_fails() {
        let err = decode(br#"{"status":"working"}"#).unwrap_err();
        assert!(matches!(err, MonitorError::Decode(_)));
    }

    #[test]
    fn test_decode_empty_or_non_string_session_id_fails() {
        assert!(decode(br#"{"session_id":""}"#).is_err());
        assert!(decode(br#"{"session_id":42}"#).is_err());
    }

    #[test]
    fn test_decode_truncated_file_fails() {
        let err = decode(br#"{"session_id":"abc","sta"#).unwrap_err();
        assert!(matches!(err, MonitorError::JsonParse(_)));
    }

    #[test]
    fn test_decode_non_object_fails() {
        assert!(matches!(
            decode(b"[1,2,3]").unwrap_err(),
            MonitorError::Decode(_)
        ));
    }

    #[test]
    fn test_decode_ignores_unknown_fields_and_wrong_types() {
        let json = br#"{
            "session_id": "abc",
            "status": 7,
            "project": null,
            "cwd": "/tmp/x",
            "model": "opus",
            "pid": 1234
        }"#;
        let decoded = decode(json).unwrap();
        assert_eq!(decoded.status, SessionStatus::Unknown);
        assert_eq!(decoded.project, "unknown");
        assert_eq!(decoded.cwd, "/tmp/x");
    }

    #[test]
    fn test_decode_unrecognised_status_maps_to_unknown() {
        let decoded = decode(br#"{"session_id":"a","status":"sleeping"}"#).unwrap();
        assert_eq!(decoded.status, SessionStatus::Unknown);
    }

    #[test]
    fn test_encode_writes_empty_timestamps_for_absent_values() {
        let bytes = encode(&SessionRecord::new("x")).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["started_at"], "");
        assert_eq!(value["terminal"], "");
        assert_eq!(value["status"], "unknown");
    }

    #[test]
    fn test_encode_uses_wire_names_for_enums() {
        let value: Value = serde_json::from_slice(&encode(&full_record()).unwrap()).unwrap();
        assert_eq!(value["status"], "attention");
        assert_eq!(value["terminal"], "terminal");

        let mut window = full_record();
        window.terminal = TerminalKind::Window;
        let value: Value = serde_json::from_slice(&encode(&window).unwrap()).unwrap();
        assert_eq!(value["terminal"], "iterm2");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00.123Z").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00").is_some());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
