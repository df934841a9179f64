//! Resilient payment router library.

pub mod blockchain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod payments;
pub mod resilience;

pub use config::schema::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use payments::{PaymentDispatcher, PaymentOutcome, PaymentRequest};
