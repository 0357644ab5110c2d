//! Startup orchestration.
//!
//! # Responsibilities
//! - Lay out first-run files
//! - Load the allow-list and the configuration tree
//! - Start background tasks (watchers, limiter sweeper)
//! - Assemble the authorization pipeline
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready); binding is the caller's job

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::allowlist::{self, AllowList};
use crate::audit::{EventSink, FanoutSink, JsonLinesSink, TracingSink};
use crate::auth::JwtAuthenticator;
use crate::config::{AuditConfig, ServerConfig};
use crate::lifecycle::scaffold::{self, ScaffoldError};
use crate::lifecycle::Shutdown;
use crate::pipeline::AuthorizationPipeline;
use crate::security::rate_limit::TokenBucketRegistry;
use crate::store::{self, ConfigStore};
use crate::watch::{AllowListTarget, ChangeWatcher, ConfigTreeTarget, WatchError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Scaffold(#[from] ScaffoldError),
    #[error("failed to open audit log directory {}: {source}", dir.display())]
    AuditLog { dir: PathBuf, source: std::io::Error },
    #[error(transparent)]
    AllowList(#[from] allowlist::LoadError),
    #[error(transparent)]
    Store(#[from] store::LoadError),
    #[error("failed to start watcher: {0}")]
    Watch(#[from] WatchError),
}

/// Everything a running server holds on to.
pub struct Services {
    pub store: Arc<ConfigStore>,
    pub allow_list: Arc<AllowList>,
    pub limiters: Arc<TokenBucketRegistry>,
    pub pipeline: Arc<AuthorizationPipeline>,
    pub sink: Arc<dyn EventSink>,
    /// Watchers and the limiter sweeper; all stop on shutdown.
    pub tasks: Vec<JoinHandle<()>>,
}

/// Audit sink described by the settings.
pub fn build_sink(config: &AuditConfig) -> Result<Arc<dyn EventSink>, StartupError> {
    if !config.enabled {
        return Ok(Arc::new(TracingSink));
    }

    let file = JsonLinesSink::new(&config.directory).map_err(|source| StartupError::AuditLog {
        dir: config.directory.clone(),
        source,
    })?;
    tracing::info!(dir = %config.directory.display(), "Audit log enabled");
    Ok(Arc::new(FanoutSink::new(vec![Arc::new(file), Arc::new(TracingSink)])))
}

/// Bring every subsystem up in order.
///
/// Must be called from within a tokio runtime.
pub fn start(
    config: &ServerConfig,
    sink: Arc<dyn EventSink>,
    shutdown: &Shutdown,
) -> Result<Services, StartupError> {
    let paths = &config.paths;
    scaffold::ensure_layout(&paths.config_dir, &paths.allowed_ips_file)?;

    let allow_list = Arc::new(AllowList::new(sink.clone()));
    allow_list.load_all(&paths.allowed_ips_file)?;

    let store = Arc::new(ConfigStore::new(sink.clone()));
    let report = store.load_all(&paths.config_dir)?;
    if !report.failed.is_empty() {
        tracing::warn!(failed = report.failed.len(), "Some config files were skipped");
    }

    let mut tasks = Vec::with_capacity(3);

    let config_target = Arc::new(ConfigTreeTarget::new(&paths.config_dir, store.clone()));
    tasks.push(ChangeWatcher::new(config_target, sink.clone()).start(shutdown.subscribe())?);

    let allow_target = Arc::new(AllowListTarget::new(
        &paths.allowed_ips_file,
        allow_list.clone(),
        sink.clone(),
    ));
    tasks.push(ChangeWatcher::new(allow_target, sink.clone()).start(shutdown.subscribe())?);

    let limiters = Arc::new(TokenBucketRegistry::from_config(&config.rate_limit));
    tasks.push(tokio::spawn(limiters.clone().run_sweeper(
        Duration::from_secs(config.rate_limit.sweep_interval_secs),
        Duration::from_secs(config.rate_limit.idle_ttl_secs),
        shutdown.subscribe(),
    )));

    let pipeline = Arc::new(AuthorizationPipeline::new(
        allow_list.clone(),
        limiters.clone(),
        Arc::new(JwtAuthenticator::from_config(&config.auth)),
        store.clone(),
        sink.clone(),
    ));

    Ok(Services {
        store,
        allow_list,
        limiters,
        pipeline,
        sink,
        tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EventType, MemorySink, Status};
    use crate::lifecycle::shutdown::drain;
    use std::fs;

    fn settings(root: &std::path::Path) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.paths.config_dir = root.join("configurations");
        config.paths.allowed_ips_file = root.join("allowed_ips.txt");
        config.auth.jwt_secret = "startup-secret".into();
        config
    }

    #[tokio::test]
    async fn test_first_run_serves_sample() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let shutdown = Shutdown::new();

        let services = start(&settings(dir.path()), sink.clone(), &shutdown).unwrap();
        assert_eq!(services.store.get("sample", "version").as_deref(), Some("1.0"));
        assert!(services.allow_list.is_empty());
        assert_eq!(services.tasks.len(), 3);

        shutdown.trigger();
        assert!(drain(services.tasks, Duration::from_secs(2)).await);

        let stopped = sink
            .events()
            .into_iter()
            .filter(|e| e.status == Status::Stopped)
            .count();
        assert_eq!(stopped, 2);
    }

    #[tokio::test]
    async fn test_unreadable_allow_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = settings(dir.path());
        // a directory exists at the path, so nothing is scaffolded and reading fails
        fs::create_dir_all(&config.paths.allowed_ips_file).unwrap();

        let sink = Arc::new(MemorySink::new());
        let result = start(&config, sink.clone(), &Shutdown::new());

        assert!(matches!(result, Err(StartupError::AllowList(_))));
        assert_eq!(sink.of_type(EventType::IpFilterLoad)[0].status, Status::Failed);
    }

    #[test]
    fn test_disabled_audit_needs_no_directory() {
        let config = AuditConfig {
            enabled: false,
            directory: PathBuf::from("/nonexistent/audit"),
        };
        assert!(build_sink(&config).is_ok());
    }

    #[test]
    fn test_enabled_audit_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuditConfig {
            enabled: true,
            directory: dir.path().join("audit_logs"),
        };
        build_sink(&config).unwrap();
        assert!(dir.path().join("audit_logs").is_dir());
    }
}
