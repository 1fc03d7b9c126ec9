//! Annotate signup CSVs with an ethnicity label inferred from each name.
//!
//! Labels come from the feedback store of verified corrections when an exact
//! match exists, and from a chat completions API otherwise.

pub mod config;
pub mod feedback;
pub mod labeler;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod recorder;
