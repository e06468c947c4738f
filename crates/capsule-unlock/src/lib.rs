//! Pure unlock rules: great-circle distance and the eligibility evaluator.
//!
//! Nothing here touches storage or reads the wall clock; callers pass the
//! current instant in.

pub mod evaluator;
pub mod geo;

pub use evaluator::{PROXIMITY_THRESHOLD_METERS, UnlockDecision, UnlockReason, evaluate};
pub use geo::{distance_meters, is_near};
