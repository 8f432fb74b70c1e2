//! Change Detection Module
//!
//! Turns two inventories into an ordered change log:
//! - Attribute comparators (field and index equivalence)
//! - Diff engine (users, tables, fields, privileges, indexes)
//! - Change records and summaries
//! - Sinks that log or persist the result

pub mod compare;
pub mod detector;
pub mod diff;
pub mod record;
pub mod sink;

pub use detector::{ChangeDetector, DetectError};
pub use record::{Change, ChangeSummary};
pub use sink::{ChangeSink, JsonLinesSink, SinkError, TracingSink};
