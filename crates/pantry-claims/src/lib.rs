//! Claim arbitration for donations.
//!
//! The backing store only offers single-record atomic updates and plain
//! append/list/delete on the intent queue, so at-most-one-winner is enforced
//! by a settle-then-check protocol (see [`arbiter`]) plus the store's
//! conditional status transition.

pub mod arbiter;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod store;
pub mod sweep;

pub use arbiter::{ArbiterConfig, ClaimArbiter, ClaimReceipt, RetryPolicy};
pub use env::Ports;
pub use error::{ClaimError, Unavailable};
pub use lifecycle::LifecycleController;
pub use notify::Notifier;
pub use sweep::Sweeper;
