//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config_server::audit::MemorySink;
use config_server::auth::issue_token;
use config_server::http::AppState;
use config_server::lifecycle;
use config_server::lifecycle::shutdown::drain;
use config_server::{HttpServer, ServerConfig, Shutdown};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const SECRET: &str = "integration-test-secret";

pub const SAMPLE: &str = "configs:\n  version: 1.0\n  feature_1: true\n";

/// A server running on an ephemeral port over a temporary tree.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    pub sink: Arc<MemorySink>,
    pub client: reqwest::Client,
    shutdown: Shutdown,
    server: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("configurations")
    }

    pub fn allowed_ips(&self) -> PathBuf {
        self.dir.path().join("allowed_ips.txt")
    }

    /// GET `path` with a valid token for `alice`.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token("alice"))
            .send()
            .await
            .unwrap()
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.server).await;
        assert!(drain(self.tasks, Duration::from_secs(5)).await);
    }
}

pub fn token(user: &str) -> String {
    issue_token(SECRET, user, Duration::from_secs(300)).unwrap()
}

/// Start a server. `prepare` may write files into the tree root and adjust
/// settings before startup; the tree starts with `sample/development.yml`.
pub async fn start_server(prepare: impl FnOnce(&Path, &mut ServerConfig)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let configs = dir.path().join("configurations");
    std::fs::create_dir_all(configs.join("sample")).unwrap();
    std::fs::write(configs.join("sample/development.yml"), SAMPLE).unwrap();

    let mut config = ServerConfig::default();
    config.paths.config_dir = configs;
    config.paths.allowed_ips_file = dir.path().join("allowed_ips.txt");
    config.auth.jwt_secret = SECRET.into();
    config.rate_limit.capacity = 1_000;
    config.rate_limit.refill_per_second = 1_000;
    config.listener.bind_address = "127.0.0.1:0".into();
    prepare(dir.path(), &mut config);

    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();
    let services = lifecycle::start(&config, sink.clone(), &shutdown).unwrap();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let state = AppState {
        pipeline: services.pipeline.clone(),
        sink: services.sink.clone(),
    };
    let server = HttpServer::new(state, &config.timeouts);
    let rx = shutdown.subscribe();
    let server = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestServer {
        addr,
        dir,
        sink,
        client: reqwest::Client::new(),
        shutdown,
        server,
        tasks: services.tasks,
    }
}

/// Poll `check` until it returns true or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
