//! Event model for storyline.
//!
//! Steps, doc entries, finalized story records, and the run/report envelopes
//! built around them. Pure data: every other crate depends on these types.

pub mod doc;
pub mod report;
pub mod story;
