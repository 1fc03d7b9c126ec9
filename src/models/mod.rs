//! Domain models for the signup labeler.
//!
//! - [`FeedbackEntry`]: A verified name → label correction, the unit of the feedback store.
//! - [`RowOutcome`]: The terminal state a data row reached during a labeling run.
//! - [`RunSummary`]: Per-outcome counters reported at the end of a run.

mod feedback_entry;
mod row;

pub use feedback_entry::*;
pub use row::*;
