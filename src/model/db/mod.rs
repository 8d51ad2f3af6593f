//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - User IDs are serialised in MongoDB's own ObjectId format.
//! - Candidate IDs are plain integers from the candidate counter.

pub mod candidate;
pub mod user;
