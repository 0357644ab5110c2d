//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the config handler
//! - Wire up middleware (timeout, request ID, tracing, CORS, panic recovery)
//! - Bind server to listener with peer address info
//! - Hand each request to the authorization pipeline
//! - Record request metrics and the per-request audit event

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::{header::AUTHORIZATION, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::audit::{AuditEvent, EventSink, EventType, Status};
use crate::auth::bearer_token;
use crate::config::TimeoutConfig;
use crate::observability::metrics;
use crate::pipeline::{AccessRequest, AuthorizationPipeline};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AuthorizationPipeline>,
    pub sink: Arc<dyn EventSink>,
}

/// HTTP front end of the config server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, timeouts: &TimeoutConfig) -> Self {
        let router = Self::build_router(state, Duration::from_secs(timeouts.request_secs));
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/{*path}", get(config_handler))
            .route("/", get(config_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(CatchPanicLayer::new())
                    .layer(CorsLayer::permissive())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Serves `GET /{product}/{environment}/{key}`.
async fn config_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let client = peer.ip().to_string();
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    let request = AccessRequest {
        client: &client,
        bearer,
        // percent-escapes are not decoded
        path: uri.path(),
    };

    let (outcome, response) = match state.pipeline.authorize(&request) {
        Ok(granted) => ("success", granted.into_response()),
        Err(denial) => (denial.outcome(), denial.into_response()),
    };

    metrics::record_request(outcome, start);

    let status = response.status();
    tracing::debug!(
        client = %client,
        method = %method,
        path = %uri.path(),
        status = status.as_u16(),
        "Request completed"
    );
    let audit_status = if status.is_success() {
        Status::Success
    } else {
        Status::Failed
    };
    state.sink.record(
        AuditEvent::new(EventType::Request, client, audit_status)
            .detail("method", method.as_str())
            .detail("path", uri.path())
            .detail("status", status.as_u16())
            .detail("latency_ms", start.elapsed().as_secs_f64() * 1000.0),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlist::AllowList;
    use crate::audit::MemorySink;
    use crate::auth::{issue_token, JwtAuthenticator};
    use crate::security::rate_limit::TokenBucketRegistry;
    use crate::store::ConfigStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::{HashMap, HashSet};
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret";

    fn router(allowed: &[&str]) -> (Router, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let store = Arc::new(ConfigStore::new(sink.clone()));
        store.replace_product(
            "sample",
            HashMap::from([("version".to_string(), "1.0".to_string())]),
        );
        let allow_list = Arc::new(AllowList::new(sink.clone()));
        allow_list.replace(allowed.iter().map(|s| s.to_string()).collect::<HashSet<_>>());

        let pipeline = Arc::new(AuthorizationPipeline::new(
            allow_list,
            Arc::new(TokenBucketRegistry::new(5, 5)),
            Arc::new(JwtAuthenticator::new(SECRET, 0)),
            store,
            sink.clone(),
        ));
        let state = AppState {
            pipeline,
            sink: sink.clone(),
        };
        (HttpServer::build_router(state, Duration::from_secs(5)), sink)
    }

    fn request(method: Method, path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 40000))));
        request
    }

    fn token() -> String {
        issue_token(SECRET, "alice", Duration::from_secs(60)).unwrap()
    }

    #[tokio::test]
    async fn test_get_value() {
        let (router, sink) = router(&[]);
        let response = router
            .oneshot(request(Method::GET, "/sample/development/version", Some(&token())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"version":"1.0"}"#);

        let requests = sink.of_type(EventType::Request);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].client_ip, "10.0.0.1");
        assert_eq!(requests[0].details["status"], 200);
    }

    #[tokio::test]
    async fn test_peer_not_in_allow_list() {
        let (router, _) = router(&["192.168.1.1"]);
        let response = router
            .oneshot(request(Method::GET, "/sample/development/version", Some(&token())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (router, sink) = router(&["10.0.0.1"]);
        let response = router
            .oneshot(request(Method::GET, "/sample/development/version", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(sink.of_type(EventType::Request)[0].status, Status::Failed);
    }

    #[tokio::test]
    async fn test_root_is_bad_request() {
        let (router, _) = router(&[]);
        let response = router
            .oneshot(request(Method::GET, "/", Some(&token())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_any_origin_is_allowed() {
        let (router, _) = router(&[]);
        let mut req = request(Method::GET, "/sample/development/version", Some(&token()));
        req.headers_mut()
            .insert("origin", "https://dashboard.example".parse().unwrap());

        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_preflight_is_answered_without_auth() {
        let (router, sink) = router(&["192.168.1.1"]);
        let mut req = request(Method::OPTIONS, "/sample/development/version", None);
        req.headers_mut()
            .insert("origin", "https://dashboard.example".parse().unwrap());
        req.headers_mut()
            .insert("access-control-request-method", "GET".parse().unwrap());

        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(sink.of_type(EventType::Request).is_empty());
    }

    #[tokio::test]
    async fn test_path_is_matched_as_sent() {
        let (router, sink) = router(&[]);
        let response = router
            .oneshot(request(Method::GET, "/my%20app/development/db%20host", Some(&token())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let access = sink.of_type(EventType::ConfigAccess);
        assert_eq!(access[0].product.as_deref(), Some("my%20app"));
        assert_eq!(access[0].config_key.as_deref(), Some("db%20host"));
    }

    #[tokio::test]
    async fn test_non_get_is_rejected() {
        let (router, _) = router(&[]);
        let response = router
            .oneshot(request(Method::POST, "/sample/development/version", Some(&token())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
