use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// ID of the counter that hands out candidate IDs.
pub const CANDIDATE_ID_COUNTER_ID: &str = "candidate_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Create a new `Counter` with the given ID, starting at the given value.
    pub fn new(id: impl Into<String>, start: u32) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| Error::Internal(format!("Failed to find counter with ID {id}")))?;
        Ok(counter.next)
    }
}

/// Ensure the candidate ID counter exists, creating it if needed.
///
/// This operation is idempotent.
pub async fn ensure_candidate_id_counter_exists(counters: &Coll<Counter>) -> Result<()> {
    let filter = doc! { "_id": CANDIDATE_ID_COUNTER_ID };
    if counters.find_one(filter, None).await?.is_none() {
        debug!("Creating candidate ID counter");
        counters
            .insert_one(Counter::new(CANDIDATE_ID_COUNTER_ID, 1), None)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;

    #[backend_test]
    async fn counter_increment(db: Database) {
        const START: u32 = 5;

        // Create a counter and insert it.
        let counters = Coll::<Counter>::from_db(&db);
        counters
            .insert_one(Counter::new("test_counter", START), None)
            .await
            .unwrap();

        // Get the next value.
        let next = Counter::next(&counters, "test_counter").await.unwrap();
        assert_eq!(next, START);

        // Check the counter was incremented.
        let counter = counters
            .find_one(doc! { "_id": "test_counter" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.next, START + 1);
    }

    #[backend_test]
    async fn missing_counter_is_an_error(db: Database) {
        let counters = Coll::<Counter>::from_db(&db);
        assert!(Counter::next(&counters, "nonexistent").await.is_err());
    }

    #[backend_test]
    async fn candidate_counter_is_created_once(db: Database) {
        let counters = Coll::<Counter>::from_db(&db);
        // The test rocket has already created it during setup.
        ensure_candidate_id_counter_exists(&counters).await.unwrap();
        ensure_candidate_id_counter_exists(&counters).await.unwrap();
        let count = counters
            .count_documents(doc! { "_id": CANDIDATE_ID_COUNTER_ID }, None)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
