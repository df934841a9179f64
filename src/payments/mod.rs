//! Payment dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! PaymentRequest (single) or Vec<PaymentRequest> (batch)
//!     → batch.rs (one task per item, bounded concurrency, input order kept)
//!     → processor.rs (retry loop)
//!         → load_balancer (select live endpoint / rotate)
//!         → fees.rs (pending nonce, marked-up gas price)
//!         → blockchain::transaction (estimate, sign, submit, await inclusion)
//!     → PaymentOutcome
//!     → history.rs (recorded by the HTTP layer)
//! ```
//!
//! # Design Decisions
//! - Every execution ends in a `PaymentOutcome`; errors never escape the loop
//! - Nonce conflicts rotate endpoints without spending the attempt budget,
//!   up to a rotation cap
//! - Priority is carried and logged but never changes fees or routing

pub mod batch;
pub mod fees;
pub mod history;
pub mod processor;
pub mod types;

pub use batch::PaymentDispatcher;
pub use fees::{FeeQuote, FeeResolver};
pub use history::{StatusFilter, TransactionHistory, TransactionRecord};
pub use processor::{InclusionPolicy, PaymentProcessor, RetryPolicy};
pub use types::{
    ErrorKind, PaymentError, PaymentFailure, PaymentOutcome, PaymentReceipt, PaymentRequest,
    Priority,
};
