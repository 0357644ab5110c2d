//! Watch target over the allow-list file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::Event;

use crate::allowlist::AllowList;
use crate::audit::{AuditEvent, EventSink, EventType, Status};
use crate::watch::{WatchError, WatchTarget};

/// Reloads the allow-list when its file is written or replaced.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by renaming a temporary file are still noticed.
pub struct AllowListTarget {
    file: PathBuf,
    list: Arc<AllowList>,
    sink: Arc<dyn EventSink>,
}

impl AllowListTarget {
    pub fn new(file: impl Into<PathBuf>, list: Arc<AllowList>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            file: file.into(),
            list,
            sink,
        }
    }

    fn is_our_file(&self, path: &Path) -> bool {
        path.file_name().is_some() && path.file_name() == self.file.file_name()
    }
}

impl WatchTarget for AllowListTarget {
    fn label(&self) -> &'static str {
        "allowlist"
    }

    fn audit_type(&self) -> EventType {
        EventType::IpFilterWatch
    }

    fn initial_paths(&self) -> Result<Vec<PathBuf>, WatchError> {
        let parent = match self.file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(vec![parent])
    }

    fn on_event(&self, event: &Event) -> Vec<PathBuf> {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return Vec::new();
        }
        if !event.paths.iter().any(|p| self.is_our_file(p)) || !self.file.is_file() {
            return Vec::new();
        }

        tracing::info!(file = %self.file.display(), "Allowed IPs file changed");
        self.sink.record(
            AuditEvent::system(EventType::IpFilterChange, Status::Detected)
                .detail("file", self.file.display().to_string())
                .detail("op", format!("{:?}", event.kind)),
        );
        // a failed reload keeps the current list; the list audits it
        let _ = self.list.load_all(&self.file);
        Vec::new()
    }
}
