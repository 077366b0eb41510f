//! # Assessment Pipeline
//!
//! The annual assessment as seen by the dashboard:
//! - `stage`: the seven stages and the per-year stage ledger
//! - `deadline`: deadline rows and their projection
//! - `aggregate`: yearly counts and pipeline narrowing
//! - `timeline`: the timeline projector

mod aggregate;
mod deadline;
mod stage;
mod timeline;

pub use aggregate::*;
pub use deadline::*;
pub use stage::*;
pub use timeline::*;
