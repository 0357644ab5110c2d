//! Product configuration store.
//!
//! # Data Flow
//! ```text
//! configurations/<product>/*.yml
//!     → document.rs (parse YAML, coerce scalars)
//!     → ConfigStore::replace_product (atomic swap of the product map)
//!     → diff.rs (old vs new, one CONFIG_CHANGE event per key)
//!     → readers call get()/lookup() concurrently
//! ```
//!
//! # Design Decisions
//! - One immutable `Arc` map per product; a reload swaps the whole map,
//!   so readers see the old map or the new one, never a mix
//! - Products live in a sharded map; reloading one product does not
//!   block reads of another
//! - The store does not partition by environment: the last file loaded
//!   for a product directory owns that product

pub mod diff;
pub mod document;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use walkdir::WalkDir;

use crate::audit::{AuditEvent, EventSink, EventType, Status, SYSTEM_CLIENT};
use crate::observability::metrics;

pub use diff::{ChangeKind, ConfigChange};

/// Flat key → value map owned by one product.
pub type ProductConfig = HashMap<String, String>;

/// Failure to load configuration from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: document::DocumentError,
    },
    #[error("cannot derive a product from {}", path.display())]
    InvalidPath { path: PathBuf },
    #[error("failed to walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
}

/// Result of a full tree load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Outcome of looking a key up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    ProductMissing,
    KeyMissing,
}

/// Concurrently readable product → key → value store.
pub struct ConfigStore {
    products: DashMap<String, Arc<ProductConfig>>,
    sink: Arc<dyn EventSink>,
}

impl ConfigStore {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            products: DashMap::new(),
            sink,
        }
    }

    /// Load every `.yml` file below `root`.
    ///
    /// Files that fail to read or parse are reported and skipped. Only a
    /// failure to walk `root` itself is returned as an error.
    pub fn load_all(&self, root: &Path) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(LoadError::Walk {
                        root: root.to_path_buf(),
                        source: e,
                    })
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry in config tree");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !document::is_config_file(entry.path()) {
                continue;
            }

            match self.load_one(entry.path()) {
                Ok(_) => {
                    tracing::info!(file = %entry.path().display(), "Loaded config file");
                    report.loaded.push(entry.into_path());
                }
                Err(_) => report.failed.push(entry.into_path()),
            }
        }

        tracing::info!(
            root = %root.display(),
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            products = self.products.len(),
            "Config tree loaded"
        );
        Ok(report)
    }

    /// Re-read one file and replace its product's map.
    ///
    /// Returns the key-level changes relative to the previous map. On failure
    /// the previous map is kept.
    pub fn load_one(&self, path: &Path) -> Result<Vec<ConfigChange>, LoadError> {
        let result = read_product(path);
        metrics::record_reload("config", result.is_ok());

        let (product, config) = match result {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load config file");
                self.sink.record(
                    AuditEvent::system(EventType::ConfigLoad, Status::Failed)
                        .detail("file", path.display().to_string())
                        .detail("error", e.to_string()),
                );
                return Err(e);
            }
        };

        let changes = self.replace_product(&product, config);

        tracing::info!(product = %product, changes = changes.len(), "Loaded configs");
        self.sink.record(
            AuditEvent::system(EventType::ConfigLoad, Status::Success)
                .product(product.as_str())
                .detail("file", path.display().to_string()),
        );
        Ok(changes)
    }

    /// Swap in a new map for `product` and audit the difference.
    pub fn replace_product(&self, product: &str, config: ProductConfig) -> Vec<ConfigChange> {
        let new = Arc::new(config);
        let old = self.products.insert(product.to_string(), Arc::clone(&new));
        metrics::record_products(self.products.len());

        let changes = diff::diff(old.as_deref(), &new);
        for change in &changes {
            self.sink.record(
                AuditEvent::new(EventType::ConfigChange, SYSTEM_CLIENT, change.kind.status())
                    .user(SYSTEM_CLIENT)
                    .product(product)
                    .key(change.key.as_str())
                    .detail("old_value", change.old_value.clone().unwrap_or_default())
                    .detail("new_value", change.new_value.clone().unwrap_or_default()),
            );
        }
        changes
    }

    /// Value of `key` in `product`.
    pub fn get(&self, product: &str, key: &str) -> Option<String> {
        self.products.get(product)?.get(key).cloned()
    }

    /// Like [`get`](Self::get) but says which level was missing.
    pub fn lookup(&self, product: &str, key: &str) -> Lookup {
        let Some(config) = self.product(product) else {
            return Lookup::ProductMissing;
        };
        match config.get(key) {
            Some(value) => Lookup::Found(value.clone()),
            None => Lookup::KeyMissing,
        }
    }

    /// Current map of one product.
    pub fn product(&self, product: &str) -> Option<Arc<ProductConfig>> {
        self.products.get(product).map(|entry| Arc::clone(entry.value()))
    }

    pub fn has_product(&self, product: &str) -> bool {
        self.products.contains_key(product)
    }

    /// Names of all loaded products, sorted.
    pub fn products(&self) -> Vec<String> {
        let mut names: Vec<String> = self.products.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

fn read_product(path: &Path) -> Result<(String, ProductConfig), LoadError> {
    let product = document::product_for(path).ok_or_else(|| LoadError::InvalidPath {
        path: path.to_path_buf(),
    })?;
    let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = document::parse(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((product, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use std::thread;

    fn store() -> (ConfigStore, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (ConfigStore::new(sink.clone()), sink)
    }

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_all_skips_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "sample/development.yml", "configs:\n  version: 1.0\n");
        write(dir.path(), "broken/development.yml", "configs: [unclosed\n");
        write(dir.path(), "billing/production.yml", "configs:\n  currency: EUR\n");
        write(dir.path(), "billing/README.md", "not a config");

        let (store, sink) = store();
        let report = store.load_all(dir.path()).unwrap();

        assert_eq!(report.loaded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(store.get("sample", "version").as_deref(), Some("1.0"));
        assert_eq!(store.get("billing", "currency").as_deref(), Some("EUR"));
        assert!(!store.has_product("broken"));
        assert_eq!(store.products(), vec!["billing".to_string(), "sample".to_string()]);

        let failures: Vec<_> = sink
            .of_type(EventType::ConfigLoad)
            .into_iter()
            .filter(|e| e.status == Status::Failed)
            .collect();
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_load_all_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store();
        let err = store.load_all(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, LoadError::Walk { .. }));
    }

    #[test]
    fn test_reload_replaces_instead_of_merging() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "sample/development.yml", "configs:\n  a: 1\n  b: 2\n");
        let (store, sink) = store();
        store.load_one(&path).unwrap();
        sink.clear();

        write(dir.path(), "sample/development.yml", "configs:\n  a: 1\n  b: 3\n  c: 4\n");
        let changes = store.load_one(&path).unwrap();

        let summary: Vec<(&str, ChangeKind)> =
            changes.iter().map(|c| (c.key.as_str(), c.kind)).collect();
        assert_eq!(summary, vec![("b", ChangeKind::Updated), ("c", ChangeKind::Added)]);

        let events = sink.of_type(EventType::ConfigChange);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].config_key.as_deref(), Some("b"));
        assert_eq!(events[0].status, Status::Updated);
        assert_eq!(events[0].details["old_value"], "2");
        assert_eq!(events[0].details["new_value"], "3");

        write(dir.path(), "sample/development.yml", "configs:\n  c: 4\n");
        store.load_one(&path).unwrap();
        assert_eq!(store.get("sample", "a"), None);
        assert_eq!(store.get("sample", "c").as_deref(), Some("4"));
    }

    #[test]
    fn test_failed_reload_keeps_previous_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "sample/development.yml", "configs:\n  a: 1\n");
        let (store, _) = store();
        store.load_one(&path).unwrap();

        write(dir.path(), "sample/development.yml", "configs: [oops\n");
        assert!(matches!(store.load_one(&path), Err(LoadError::Parse { .. })));
        assert_eq!(store.get("sample", "a").as_deref(), Some("1"));
    }

    #[test]
    fn test_lookup_distinguishes_missing_levels() {
        let (store, _) = store();
        store.replace_product("sample", ProductConfig::from([("version".into(), "1.0".into())]));

        assert_eq!(store.lookup("sample", "version"), Lookup::Found("1.0".into()));
        assert_eq!(store.lookup("sample", "nope"), Lookup::KeyMissing);
        assert_eq!(store.lookup("other", "version"), Lookup::ProductMissing);
    }

    #[test]
    fn test_readers_never_see_a_mixed_map() {
        let (store, _) = store();
        let store = Arc::new(store);
        let keys: Vec<String> = (0..32).map(|i| format!("k{}", i)).collect();
        let generation = |g: u32| -> ProductConfig {
            keys.iter().map(|k| (k.clone(), g.to_string())).collect()
        };
        store.replace_product("p", generation(0));

        let writer = {
            let store = Arc::clone(&store);
            let maps: Vec<ProductConfig> = (1..=200).map(generation).collect();
            thread::spawn(move || {
                for map in maps {
                    store.replace_product("p", map);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = store.product("p").unwrap();
                        let first = snapshot.values().next().unwrap().clone();
                        assert!(snapshot.values().all(|v| *v == first));
                        assert_eq!(snapshot.len(), 32);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.get("p", "k0").as_deref(), Some("200"));
    }
}
