use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{db::candidate::Candidate, mongodb::Coll};

/// Vote counts keyed by candidate name, ordered by name.
pub type Stats = BTreeMap<String, u32>;

/// Tally every candidate.
pub async fn load_stats(candidates: &Coll<Candidate>) -> Result<Stats> {
    let stats = Candidate::all(candidates)
        .await?
        .into_iter()
        .map(|c| (c.candidate.name, c.candidate.vote_count))
        .collect();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;
    use crate::model::mongodb::u32_id_filter;

    #[backend_test]
    async fn stats_reflect_tallies(candidates: Coll<Candidate>) {
        candidates
            .update_one(u32_id_filter(2), doc! { "$inc": { "vote_count": 3 } }, None)
            .await
            .unwrap();

        let stats = load_stats(&candidates).await.unwrap();
        let expected: Stats = [("Angel Reji".to_string(), 0), ("Dijo Joshi".to_string(), 3)]
            .into_iter()
            .collect();
        assert_eq!(stats, expected);
    }
}
