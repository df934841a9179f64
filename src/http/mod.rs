//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, body limit)
//!     → payment.rs (validate body, dispatch, record history)
//!     → response.rs (JSON errors for rejected requests)
//!     → Send to client
//! ```

pub mod payment;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
