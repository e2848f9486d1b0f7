//! Match/conversation reconciliation.
//!
//! Matches and conversations are fetched independently and conversations are
//! created lazily, so the two surfaces a participant sees (matches still to
//! act on, and message threads) have to be derived from both collections.
//! Everything here is pure and free of I/O.

pub mod inbox;
pub mod pair;
pub mod reconcile;
pub mod thread;

pub use inbox::{Confirmation, Inbox, PendingOpen};
pub use pair::{PairKey, pair_key};
pub use reconcile::{Reconciliation, reconcile};
pub use thread::{SYNTHETIC_PREFIX, Thread, ThreadRef};
