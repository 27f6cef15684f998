#![forbid(unsafe_code)]
//! Domain engine for billbook.
//!
//! Three batch operations drive the ledger forward: the recurring-bill
//! materializer, the threshold alert evaluator, and the promotion countdown
//! monitor. All three are safe to call repeatedly for the same instant; the
//! store's transactional guards (`last_generated` compare-and-set,
//! `last_triggered` same-day suppression) make the second call a no-op.
//!
//! Time is always an explicit parameter. Callers pass the as-of date and the
//! wall-clock instant, which keeps every operation replayable in tests.

mod materializer;
mod promotions;
mod thresholds;

pub use materializer::{materialize_due_bills, CreatedBill, MaterializeOutcome};
pub use promotions::{check_promotions, TriggeredPromotion};
pub use thresholds::{evaluate_thresholds, TriggeredAlert};

pub const CRATE_NAME: &str = "billbook-engine";
