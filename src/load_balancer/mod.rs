//! Endpoint selection subsystem.
//!
//! # Data Flow
//! ```text
//! Payment needs an endpoint
//!     → pool.rs (select_live_endpoint)
//!         → round_robin.rs (probe order from the shared cursor)
//!         → endpoint.rs (liveness probe: latest block number)
//!     → first endpoint that answers becomes the cursor
//!
//! Submission failed in an endpoint-specific way (nonce conflict)
//!     → pool.rs (advance_cursor past the failing endpoint, no probe)
//!     → pool.rs (select_live_endpoint_from the endpoint after it)
//! ```
//!
//! # Design Decisions
//! - No cached health state: every selection re-probes from the last good cursor
//! - The cursor is the only shared mutable state; it moves by atomic
//!   compare-exchange, so concurrent payments cannot push it out of range
//! - Rotation is relative to the endpoint that failed, never to the shared
//!   cursor: two payments failing on the same node both move to the next one
//! - An unreachable endpoint costs one wasted round trip, not a blacklist window

pub mod endpoint;
pub mod pool;
pub mod round_robin;

pub use endpoint::Endpoint;
pub use pool::{AllEndpointsUnavailable, EndpointPool};
