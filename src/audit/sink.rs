//! Audit sinks.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, Utc};

use crate::audit::{AuditEvent, EventType};

/// Write-only destination for audit events.
///
/// Implementations swallow their own failures; recording an event never
/// fails the operation that produced it.
pub trait EventSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Appends one JSON object per line to `<dir>/audit_<date>.log`.
///
/// The file rolls over when the UTC date changes. Writes are synchronous
/// appends made on the caller's thread.
pub struct JsonLinesSink {
    directory: PathBuf,
    current: Mutex<Option<(NaiveDate, File)>>,
}

impl JsonLinesSink {
    /// Create the sink, making sure the directory exists.
    pub fn new(directory: impl Into<PathBuf>) -> std::io::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            current: Mutex::new(None),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file used for events written on `date`.
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("audit_{}.log", date.format("%Y-%m-%d")))
    }

    fn write_line(&self, line: &[u8]) -> std::io::Result<()> {
        let today = Utc::now().date_naive();
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        let stale = !matches!(current.as_ref(), Some((date, _)) if *date == today);
        if stale {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.file_for(today))?;
            *current = Some((today, file));
        }

        if let Some((_, file)) = current.as_mut() {
            file.write_all(line)?;
        }
        Ok(())
    }
}

impl EventSink for JsonLinesSink {
    fn record(&self, event: AuditEvent) {
        let mut line = match serde_json::to_vec(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize audit event");
                return;
            }
        };
        line.push(b'\n');

        if let Err(e) = self.write_line(&line) {
            tracing::error!(
                error = %e,
                directory = %self.directory.display(),
                "Failed to write audit event"
            );
        }
    }
}

/// Emits every event on the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: AuditEvent) {
        let details = serde_json::to_string(&event.details).unwrap_or_default();
        tracing::info!(
            target: "audit",
            event_type = ?event.event_type,
            status = ?event.status,
            client_ip = %event.client_ip,
            user_id = event.user_id.as_deref(),
            product = event.product.as_deref(),
            environment = event.environment.as_deref(),
            config_key = event.config_key.as_deref(),
            details = %details,
            "audit"
        );
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events of one type, in order.
    pub fn of_type(&self, event_type: EventType) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Forwards every event to each inner sink.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn record(&self, event: AuditEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }
}
