mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::{u32_id_filter, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_candidate_id_counter_exists, Counter, CANDIDATE_ID_COUNTER_ID};
pub use errors::{
    is_duplicate_key_error, is_transient_transaction_error, is_unknown_commit_result,
};
