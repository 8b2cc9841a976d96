//! Network access under politeness constraints.
//!
//! Every request the engine makes goes through [`FetchClient`], which layers:
//!
//! | Layer | Module | Role |
//! |-------|--------|------|
//! | Cache | [`cache`] | Disk-backed replay, keyed by URL hash |
//! | Robots | [`robots`] | Per-origin robots.txt check, fail-open |
//! | Throttle | [`rate_limit`] | Minimum interval per domain |
//! | HTTP | [`client`] | Bounded-timeout GET with identifying user agent |
//!
//! The robots gate and rate limiter are plain objects injected into the
//! client (and shared via `Arc`), so two collectors never share politeness
//! state by accident.

pub mod cache;
pub mod client;
pub mod rate_limit;
pub mod robots;

pub use cache::ResponseCache;
pub use client::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, FetchClient, build_http_client};
pub use rate_limit::DomainRateLimiter;
pub use robots::{RobotsGate, RobotsTxt};
