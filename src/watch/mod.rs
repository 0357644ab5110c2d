//! Filesystem watchers for hot reload.
//!
//! # Data Flow
//! ```text
//! notify backend thread
//!     → unbounded channel of notify::Result<Event>
//!     → ChangeWatcher::run (tokio task, selects on shutdown too)
//!     → WatchTarget::on_event
//!     → owning component reloads (ConfigStore::load_one / AllowList::load_all)
//! ```
//!
//! # Design Decisions
//! - Subscriptions are made before the task is spawned, so a watch that
//!   cannot be established fails startup
//! - Notification errors are logged and the loop keeps going
//! - Directories reported by a target after startup are subscribed on
//!   the fly, then scanned so files written before the watch landed are
//!   not missed

pub mod allow_list;
pub mod config_tree;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::audit::{AuditEvent, EventSink, EventType, Status};

pub use allow_list::AllowListTarget;
pub use config_tree::ConfigTreeTarget;

/// Failure to set up a watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("failed to scan {}: {source}", root.display())]
    Scan {
        root: PathBuf,
        source: walkdir::Error,
    },
}

/// What a watcher observes and how it reacts.
pub trait WatchTarget: Send + Sync + 'static {
    /// Short name used in logs.
    fn label(&self) -> &'static str;

    /// Audit event type for watcher lifecycle events.
    fn audit_type(&self) -> EventType;

    /// Directories to subscribe (non-recursively) at startup.
    fn initial_paths(&self) -> Result<Vec<PathBuf>, WatchError>;

    /// React to one notification. Returns new directories to subscribe.
    fn on_event(&self, event: &Event) -> Vec<PathBuf>;

    /// Called once `dir` is subscribed. Returns child directories that need
    /// subscribing as well.
    fn on_subscribed(&self, _dir: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Long-lived watcher task over one target.
pub struct ChangeWatcher<T: WatchTarget> {
    target: Arc<T>,
    sink: Arc<dyn EventSink>,
}

impl<T: WatchTarget> ChangeWatcher<T> {
    pub fn new(target: Arc<T>, sink: Arc<dyn EventSink>) -> Self {
        Self { target, sink }
    }

    /// Subscribe to the target's paths and spawn the event loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self, shutdown: broadcast::Receiver<()>) -> Result<JoinHandle<()>, WatchError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;

        let paths = self.target.initial_paths()?;
        for path in &paths {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
        }

        tracing::info!(target_name = self.target.label(), paths = paths.len(), "Watcher started");
        self.sink.record(
            AuditEvent::system(self.target.audit_type(), Status::Started)
                .detail("paths", paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>()),
        );

        Ok(tokio::spawn(self.run(watcher, event_rx, shutdown)))
    }

    async fn run(
        self,
        mut watcher: RecommendedWatcher,
        mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Some(Ok(event)) => {
                        let new_dirs = self.target.on_event(&event);
                        self.subscribe(&mut watcher, new_dirs);
                    }
                    Some(Err(e)) => {
                        tracing::error!(target_name = self.target.label(), error = %e, "Watch error");
                        self.sink.record(
                            AuditEvent::system(self.target.audit_type(), Status::Error)
                                .detail("error", e.to_string()),
                        );
                    }
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!(target_name = self.target.label(), "Watcher received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        self.sink
            .record(AuditEvent::system(self.target.audit_type(), Status::Stopped));
    }

    fn subscribe(&self, watcher: &mut RecommendedWatcher, dirs: Vec<PathBuf>) {
        let mut pending: VecDeque<PathBuf> = dirs.into();
        while let Some(dir) = pending.pop_front() {
            if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
                tracing::error!(dir = %dir.display(), error = %e, "Error adding watch to directory");
                continue;
            }
            tracing::info!(dir = %dir.display(), "Watching new directory");
            pending.extend(self.target.on_subscribed(&dir));
        }
    }
}
