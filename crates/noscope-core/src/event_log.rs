use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use noscope_types::event::Event;
use serde_json::Value;
use uuid::Uuid;

use crate::redaction::redact_structured;

fn generate_run_id() -> String {
    let ts = Utc::now().format("%Y%m%dT%H%MZ");
    let hex = Uuid::new_v4().simple().to_string();
    format!("{ts}_{}", &hex[..8])
}

/// Layout of the `.noscope/runs/<run_id>/` directory a single run writes to.
#[derive(Debug, Clone)]
pub struct RunDir {
    pub run_id: String,
    pub path: PathBuf,
}

impl RunDir {
    pub fn new(base: Option<&Path>, run_id: Option<String>) -> Result<Self> {
        let run_id = run_id.unwrap_or_else(generate_run_id);
        let base = base
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".noscope/runs"));
        let path = base.join(&run_id);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("creating run directory {}", path.display()))?;
        Ok(Self { run_id, path })
    }

    pub fn events_path(&self) -> PathBuf {
        self.path.join("events.jsonl")
    }

    pub fn plan_path(&self) -> PathBuf {
        self.path.join("plan.json")
    }

    pub fn contract_path(&self) -> PathBuf {
        self.path.join("contract.json")
    }

    pub fn capabilities_request_path(&self) -> PathBuf {
        self.path.join("capabilities_request.json")
    }

    pub fn capabilities_grant_path(&self) -> PathBuf {
        self.path.join("capabilities_grant.json")
    }

    pub fn handoff_path(&self) -> PathBuf {
        self.path.join("handoff.md")
    }
}

struct Writer {
    file: std::fs::File,
    seq: u64,
}

/// Append-only JSONL event log. A single [`Mutex`] serializes writers so
/// `seq` stays strictly monotonic and gap-free.
pub struct EventLog {
    run_id: String,
    writer: Mutex<Writer>,
    closed: AtomicBool,
}

impl EventLog {
    pub fn open(run_dir: &RunDir) -> Result<Self> {
        let path = run_dir.events_path();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .mode(0o600)
            .open(&path)
            .with_context(|| format!("opening event log {}", path.display()))?;
        // Best effort; some filesystems ignore the requested mode at creation.
        let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600));

        Ok(Self {
            run_id: run_dir.run_id.clone(),
            writer: Mutex::new(Writer { file, seq: 0 }),
            closed: AtomicBool::new(false),
        })
    }

    /// Append an event to the log, applying automatic secret redaction to
    /// every field before it hits disk. Returns the event that was written.
    /// A no-op after [`EventLog::close`] — returns the event it would have
    /// written without touching disk or advancing `seq`.
    pub fn emit(
        &self,
        phase: &str,
        event_type: &str,
        summary: &str,
        data: Value,
        result: Option<Value>,
    ) -> Result<Event> {
        let secrets = HashMap::new();

        if self.closed.load(Ordering::Acquire) {
            return Ok(Event {
                ts: Utc::now(),
                run_id: self.run_id.clone(),
                phase: phase.to_string(),
                seq: 0,
                event_type: event_type.to_string(),
                summary: summary.to_string(),
                data,
                result,
            });
        }

        let mut writer = self.writer.lock().expect("event log mutex poisoned");
        writer.seq += 1;

        let safe_summary = match redact_structured(&Value::String(summary.to_string()), &secrets) {
            Value::String(s) => s,
            _ => summary.to_string(),
        };

        let event = Event {
            ts: Utc::now(),
            run_id: self.run_id.clone(),
            phase: phase.to_string(),
            seq: writer.seq,
            event_type: event_type.to_string(),
            summary: safe_summary,
            data: redact_structured(&data, &secrets),
            result: result.map(|r| redact_structured(&r, &secrets)),
        };

        let line = serde_json::to_string(&event).context("serializing event")?;
        writeln!(writer.file, "{line}").context("writing event to log")?;
        writer.file.flush().context("flushing event log")?;

        Ok(event)
    }

    /// Flush the underlying writer and mark the log closed. Every `emit`
    /// call after this point is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().expect("event log mutex poisoned");
        writer.file.flush().context("flushing event log on close")?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emits_gap_free_monotonic_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = RunDir::new(Some(dir.path()), Some("test-run".to_string())).unwrap();
        let log = EventLog::open(&run_dir).unwrap();

        let e1 = log.emit("PLAN", "phase_start", "starting", json!({}), None).unwrap();
        let e2 = log.emit("PLAN", "phase_end", "done", json!({}), None).unwrap();

        assert_eq!(e1.seq, 1);
        assert_eq!(e2.seq, 2);
    }

    #[test]
    fn emit_after_close_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = RunDir::new(Some(dir.path()), Some("test-run".to_string())).unwrap();
        let log = EventLog::open(&run_dir).unwrap();

        log.emit("PLAN", "phase_start", "starting", json!({}), None).unwrap();
        log.close().unwrap();
        log.emit("PLAN", "phase_end", "done", json!({}), None).unwrap();

        let contents = std::fs::read_to_string(run_dir.events_path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn file_permissions_are_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = RunDir::new(Some(dir.path()), Some("test-run".to_string())).unwrap();
        let log = EventLog::open(&run_dir).unwrap();
        log.emit("PLAN", "phase_start", "starting", json!({}), None).unwrap();

        let meta = std::fs::metadata(run_dir.events_path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }
}
