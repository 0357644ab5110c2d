//! Per-request authorization pipeline.
//!
//! # Data Flow
//! ```text
//! AccessRequest { client, bearer, path }
//!     → IP gate        (AllowList)            ─ IpDenied
//!     → rate gate      (TokenBucketRegistry)  ─ RateLimited
//!     → authentication (Authenticator)        ─ Unauthorized
//!     → path parse     (path.rs)              ─ BadRequest
//!     → environment    (path::Environment)    ─ EnvNotSupported
//!     → lookup         (ConfigStore)          ─ NotFound
//!     → Granted { key, value }
//! ```
//!
//! # Design Decisions
//! - Stages run in a fixed order and stop at the first rejection
//! - Every terminal outcome is audited
//! - Transport-agnostic: status codes are decided by the HTTP layer

pub mod path;

use std::sync::Arc;

use crate::allowlist::AllowList;
use crate::audit::{AuditEvent, EventSink, EventType, Status};
use crate::auth::{AuthError, Authenticator, Subject};
use crate::security::rate_limit::TokenBucketRegistry;
use crate::store::{ConfigStore, Lookup};

pub use path::{Environment, RequestPath};

/// What the pipeline needs to know about an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    /// Client identity, the peer IP literal.
    pub client: &'a str,
    /// Token from the `Authorization: Bearer` header, if any.
    pub bearer: Option<&'a str>,
    pub path: &'a str,
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Granted {
    pub subject: Subject,
    pub product: String,
    pub environment: Environment,
    pub key: String,
    pub value: String,
}

/// Which level of the store had nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    ProductMissing,
    KeyMissing,
}

impl NotFoundReason {
    pub fn as_str(self) -> &'static str {
        match self {
            NotFoundReason::ProductMissing => "product not found",
            NotFoundReason::KeyMissing => "key not found",
        }
    }
}

/// Terminal rejection of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    IpDenied,
    RateLimited,
    Unauthorized,
    BadRequest,
    EnvNotSupported(String),
    NotFound(NotFoundReason),
}

impl Denial {
    /// Stable label for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            Denial::IpDenied => "ip_denied",
            Denial::RateLimited => "rate_limited",
            Denial::Unauthorized => "unauthorized",
            Denial::BadRequest => "bad_request",
            Denial::EnvNotSupported(_) => "env_not_supported",
            Denial::NotFound(_) => "not_found",
        }
    }
}

/// Composes the allow-list, rate limiter, authenticator and store.
pub struct AuthorizationPipeline {
    allow_list: Arc<AllowList>,
    limiters: Arc<TokenBucketRegistry>,
    authenticator: Arc<dyn Authenticator>,
    store: Arc<ConfigStore>,
    sink: Arc<dyn EventSink>,
}

impl AuthorizationPipeline {
    pub fn new(
        allow_list: Arc<AllowList>,
        limiters: Arc<TokenBucketRegistry>,
        authenticator: Arc<dyn Authenticator>,
        store: Arc<ConfigStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            allow_list,
            limiters,
            authenticator,
            store,
            sink,
        }
    }

    /// Run every stage for one request.
    pub fn authorize(&self, request: &AccessRequest<'_>) -> Result<Granted, Denial> {
        let client = request.client;

        if !self.allow_list.is_allowed(client) {
            tracing::warn!(client = %client, "IP not allowed");
            self.sink.record(
                AuditEvent::new(EventType::IpFilter, client, Status::Denied)
                    .detail("reason", "IP not in allowed list"),
            );
            return Err(Denial::IpDenied);
        }

        if !self.limiters.get_limiter(client).allow() {
            tracing::warn!(client = %client, "Rate limit exceeded");
            self.sink.record(
                AuditEvent::new(EventType::RateLimit, client, Status::Denied)
                    .detail("path", request.path),
            );
            return Err(Denial::RateLimited);
        }

        let subject = match self.authenticate(request.bearer) {
            Ok(subject) => {
                self.sink
                    .record(AuditEvent::new(EventType::Auth, client, Status::Success).user(subject.id.as_str()));
                subject
            }
            Err(e) => {
                tracing::warn!(client = %client, path = %request.path, error = %e, "Unauthorized access attempt");
                self.sink.record(
                    AuditEvent::new(EventType::Auth, client, Status::Failed).detail("reason", e.to_string()),
                );
                return Err(Denial::Unauthorized);
            }
        };

        let Some(path) = RequestPath::parse(request.path) else {
            tracing::warn!(client = %client, path = %request.path, "Invalid request path");
            return Err(Denial::BadRequest);
        };

        let access = |status: Status| {
            AuditEvent::new(EventType::ConfigAccess, client, status)
                .user(subject.id.as_str())
                .product(path.product.as_str())
                .environment(path.environment.as_str())
                .key(path.key.as_str())
        };

        let environment = match path.environment.parse::<Environment>() {
            Ok(environment) => environment,
            Err(env) => {
                tracing::warn!(client = %client, environment = %env, "Unsupported environment");
                self.sink
                    .record(access(Status::Denied).detail("reason", "environment not supported"));
                return Err(Denial::EnvNotSupported(env));
            }
        };

        let value = match self.store.lookup(&path.product, &path.key) {
            Lookup::Found(value) => value,
            Lookup::ProductMissing => return Err(self.not_found(&path, NotFoundReason::ProductMissing, &access)),
            Lookup::KeyMissing => return Err(self.not_found(&path, NotFoundReason::KeyMissing, &access)),
        };

        tracing::info!(
            client = %client,
            user = %subject.id,
            product = %path.product,
            environment = %environment,
            key = %path.key,
            "Served config value"
        );
        self.sink.record(access(Status::Success));

        Ok(Granted {
            subject,
            product: path.product,
            environment,
            key: path.key,
            value,
        })
    }

    fn authenticate(&self, bearer: Option<&str>) -> Result<Subject, AuthError> {
        let token = bearer.ok_or(AuthError::MissingToken)?;
        self.authenticator.authenticate(token)
    }

    fn not_found(
        &self,
        path: &RequestPath,
        reason: NotFoundReason,
        access: impl Fn(Status) -> AuditEvent,
    ) -> Denial {
        tracing::warn!(
            product = %path.product,
            key = %path.key,
            reason = reason.as_str(),
            "Config lookup failed"
        );
        self.sink.record(access(Status::Denied).detail("reason", reason.as_str()));
        Denial::NotFound(reason)
    }
}
