//! Server settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI / env overrides (loader::Overrides)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → handed to startup, which builds every subsystem from it
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; product configs and the
//!   allow-list are the hot-reloaded state, not these settings
//! - All fields have defaults to allow minimal files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, Overrides};
pub use schema::{
    AuditConfig, AuthConfig, ListenerConfig, LogFormat, ObservabilityConfig, PathsConfig,
    RateLimitConfig, ServerConfig, TimeoutConfig,
};
