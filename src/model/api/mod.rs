//! API-compatible types.
//!
//! The types in this module are what the routes serialise, e.g.:
//!
//! - Internal bookkeeping like `has_voted` is omitted.
//! - Candidate profile links are named for what they are.

pub mod candidate;
pub mod results;
pub mod stats;
