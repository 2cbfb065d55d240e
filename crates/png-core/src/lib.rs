//! png-core: shared foundation for the nodal-gradient workspace.
//!
//! Contains:
//! - ids (compact ids for mesh entities and parts)
//! - timing (opt-in assembly/solve timers)

pub mod ids;
pub mod timing;

pub use ids::*;
