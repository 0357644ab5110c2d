//! Hot-reloaded configuration server library.

// Hot-reloaded state
pub mod allowlist;
pub mod store;
pub mod watch;

// Request path
pub mod auth;
pub mod http;
pub mod pipeline;
pub mod security;

// Cross-cutting concerns
pub mod audit;
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
