//! Watch target over the product configuration tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::Event;
use walkdir::WalkDir;

use crate::audit::EventType;
use crate::store::{document, ConfigStore};
use crate::watch::{WatchError, WatchTarget};

/// Reloads a product whenever one of its `.yml` files is written.
pub struct ConfigTreeTarget {
    root: PathBuf,
    store: Arc<ConfigStore>,
}

impl ConfigTreeTarget {
    pub fn new(root: impl Into<PathBuf>, store: Arc<ConfigStore>) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }

    fn reload(&self, path: &Path) {
        tracing::info!(file = %path.display(), "Config file changed");
        // failures are logged and audited by the store; the old map stays
        let _ = self.store.load_one(path);
    }
}

impl WatchTarget for ConfigTreeTarget {
    fn label(&self) -> &'static str {
        "config"
    }

    fn audit_type(&self) -> EventType {
        EventType::ConfigWatch
    }

    fn initial_paths(&self) -> Result<Vec<PathBuf>, WatchError> {
        let mut dirs = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|source| WatchError::Scan {
                root: self.root.clone(),
                source,
            })?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        Ok(dirs)
    }

    fn on_event(&self, event: &Event) -> Vec<PathBuf> {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return Vec::new();
        }

        let mut new_dirs = Vec::new();
        for path in &event.paths {
            if event.kind.is_create() && path.is_dir() {
                new_dirs.push(path.clone());
            } else if document::is_config_file(path) && path.is_file() {
                self.reload(path);
            }
        }
        new_dirs
    }

    fn on_subscribed(&self, dir: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to scan new directory");
                return Vec::new();
            }
        };

        let mut children = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                children.push(path);
            } else if document::is_config_file(&path) && path.is_file() {
                self.reload(&path);
            }
        }
        children
    }
}
