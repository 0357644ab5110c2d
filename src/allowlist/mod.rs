//! Client allow-list.
//!
//! # Data Flow
//! ```text
//! allowed_ips.txt
//!     → parse.rs (one identity per line, # comments)
//!     → AllowList::load_all (swap the whole set)
//!     → IP_FILTER_CHANGE events for added/removed identities
//!     → is_allowed() on every request
//! ```
//!
//! # Design Decisions
//! - An empty list allows every client
//! - Exact string match only; no CIDR ranges
//! - Readers take a lock-free snapshot; reloads are serialized so each
//!   diff is computed against the set it replaces

pub mod parse;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::audit::{AuditEvent, EventSink, EventType, Status};
use crate::observability::metrics;

/// Failure to read the allow-list file.
#[derive(Debug, Error)]
#[error("failed to read allow-list {}: {source}", path.display())]
pub struct LoadError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Identities added and removed by a reload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AllowListDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl AllowListDiff {
    fn between(old: &HashSet<String>, new: &HashSet<String>) -> Self {
        let mut added: Vec<String> = new.difference(old).cloned().collect();
        let mut removed: Vec<String> = old.difference(new).cloned().collect();
        added.sort();
        removed.sort();
        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Set of client identities allowed to query the server.
pub struct AllowList {
    entries: ArcSwap<HashSet<String>>,
    reload: Mutex<()>,
    sink: Arc<dyn EventSink>,
}

impl AllowList {
    /// Start with an empty list, which allows everyone.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashSet::new()),
            reload: Mutex::new(()),
            sink,
        }
    }

    /// Read `path` and replace the whole list with its contents.
    ///
    /// On a read failure the current list is kept and the error returned;
    /// the caller decides whether that is fatal.
    pub fn load_all(&self, path: &Path) -> Result<AllowListDiff, LoadError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(source) => {
                let err = LoadError {
                    path: path.to_path_buf(),
                    source,
                };
                tracing::error!(error = %err, "Failed to load allow-list");
                metrics::record_reload("allowlist", false);
                self.sink.record(
                    AuditEvent::system(EventType::IpFilterLoad, Status::Failed)
                        .detail("file", path.display().to_string())
                        .detail("error", err.source.to_string()),
                );
                return Err(err);
            }
        };

        let diff = self.replace(parse::parse(&content));
        metrics::record_reload("allowlist", true);

        tracing::info!(
            file = %path.display(),
            entries = self.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            "Loaded allow-list"
        );
        self.sink.record(
            AuditEvent::system(EventType::IpFilterLoad, Status::Success)
                .detail("file", path.display().to_string()),
        );
        Ok(diff)
    }

    /// Swap in a new set and audit the difference.
    pub fn replace(&self, entries: HashSet<String>) -> AllowListDiff {
        let _guard = self.reload.lock().unwrap_or_else(PoisonError::into_inner);

        let new = Arc::new(entries);
        let old = self.entries.swap(Arc::clone(&new));
        metrics::record_allowlist_size(new.len());

        let diff = AllowListDiff::between(&old, &new);
        for ip in &diff.added {
            self.sink.record(
                AuditEvent::system(EventType::IpFilterChange, Status::Added).detail("ip", ip.as_str()),
            );
        }
        for ip in &diff.removed {
            self.sink.record(
                AuditEvent::system(EventType::IpFilterChange, Status::Removed)
                    .detail("ip", ip.as_str()),
            );
        }
        diff
    }

    /// Whether `identity` may query the server. An empty list allows all.
    pub fn is_allowed(&self, identity: &str) -> bool {
        let entries = self.entries.load();
        entries.is_empty() || entries.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Current set.
    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        self.entries.load_full()
    }
}
