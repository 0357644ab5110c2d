//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client token bucket, consulted by the pipeline)
//!     → [authentication, lookup]
//!     → headers.rs (security headers on successful responses)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a rejected check ends the request
//! - Client identity is the TCP peer address; forwarded headers are not trusted

pub mod headers;
pub mod rate_limit;
