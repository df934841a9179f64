//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Payment attempt failed:
//!     → retries.rs (nonce conflict? rotate endpoint instead of waiting)
//!     → backoff.rs (otherwise wait attempt × unit before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every RPC call and every inclusion wait has a deadline
//! - Rotation and delay-retry have separate budgets
//! - Delay grows linearly with the attempt number, no jitter

pub mod backoff;
pub mod retries;
