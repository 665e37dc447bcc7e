//! Policy module
//!
//! Cost-reduction policies applied to each job before it is costed.

pub mod engine;

pub use engine::{PolicyEngine, PolicyOutcome};
