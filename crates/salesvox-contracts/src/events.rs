use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Optional append-only JSONL activity log.
///
/// Each record is one compact JSON object with `type`, `session_id` and `ts`
/// followed by the payload fields. A disabled log accepts records and drops
/// them, so callers never branch on whether logging was requested.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    inner: Option<Arc<ActivityLogInner>>,
}

#[derive(Debug)]
struct ActivityLogInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl ActivityLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn to_file(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Some(Arc::new(ActivityLogInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            })),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.as_ref().map(|inner| inner.path.as_path())
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// `payload` should be a JSON object; any other value is stored under
    /// `value`. Reserved keys in the payload are ignored.
    pub fn record(&self, event_type: &str, payload: Value) -> anyhow::Result<()> {
        let Some(inner) = self.inner.as_ref() else {
            return Ok(());
        };

        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        match payload {
            Value::Object(fields) => {
                for (key, value) in fields {
                    event.entry(key).or_insert(value);
                }
            }
            Value::Null => {}
            other => {
                event.insert("value".to_string(), other);
            }
        }

        if let Some(parent) = inner.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let line = serde_json::to_string(&event)?;
        let _guard = inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("activity log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::ActivityLog;

    #[test]
    fn record_writes_one_compact_line_per_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("activity.jsonl");
        let log = ActivityLog::to_file(&path, "session-42");

        log.record("turn_started", json!({"utterance": "hello"}))?;
        log.record("turn_finished", json!({"tool_calls": 0}))?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0])?;
        assert_eq!(first["type"], json!("turn_started"));
        assert_eq!(first["session_id"], json!("session-42"));
        assert_eq!(first["utterance"], json!("hello"));
        DateTime::parse_from_rfc3339(first["ts"].as_str().unwrap_or(""))?;

        let second: Value = serde_json::from_str(lines[1])?;
        assert_eq!(second["tool_calls"], json!(0));
        Ok(())
    }

    #[test]
    fn payload_cannot_override_reserved_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("activity.jsonl");
        let log = ActivityLog::to_file(&path, "session-42");
        log.record("tool_invoked", json!({"type": "spoofed", "session_id": "other"}))?;

        let parsed: Value = serde_json::from_str(fs::read_to_string(&path)?.trim())?;
        assert_eq!(parsed["type"], json!("tool_invoked"));
        assert_eq!(parsed["session_id"], json!("session-42"));
        Ok(())
    }

    #[test]
    fn disabled_log_is_a_no_op() -> anyhow::Result<()> {
        let log = ActivityLog::disabled();
        assert!(!log.is_enabled());
        assert!(log.path().is_none());
        log.record("turn_started", json!({}))?;
        Ok(())
    }
}
