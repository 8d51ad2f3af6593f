use std::ops::{Deref, DerefMut};

use mongodb::{bson::doc, options::FindOptions};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::mongodb::{Coll, Counter, CANDIDATE_ID_COUNTER_ID};

/// Unique candidate ID.
pub type CandidateId = u32;

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    pub bio: String,
    /// Profile link shown next to the candidate.
    pub linkedin: String,
    /// Running tally. Only ever incremented, and only by casting a vote.
    #[serde(default)]
    pub vote_count: u32,
}

impl CandidateCore {
    /// Create a candidate with no votes.
    pub fn new(
        name: impl Into<String>,
        bio: impl Into<String>,
        linkedin: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            bio: bio.into(),
            linkedin: linkedin.into(),
            vote_count: 0,
        }
    }

    /// The ballot used when the configuration doesn't provide one.
    pub fn default_ballot() -> Vec<Self> {
        vec![
            Self::new(
                "Angel Reji",
                "Frontend Specialist",
                "https://www.linkedin.com/in/angel-reji-6ab4a2390",
            ),
            Self::new(
                "Dijo Joshi",
                "Backend Specialist",
                "https://www.linkedin.com/in/dijojoshi",
            ),
        ]
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: CandidateId,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Candidate {
    /// All candidates, ordered by ID.
    pub async fn all(candidates: &Coll<Candidate>) -> Result<Vec<Candidate>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let all = candidates.find(None, options).await?.try_collect().await?;
        Ok(all)
    }

    /// Insert the given ballot if there are no candidates yet, allocating
    /// IDs from the candidate counter. Returns how many were inserted.
    ///
    /// This operation is idempotent.
    pub async fn seed_if_empty(
        candidates: &Coll<Candidate>,
        counters: &Coll<Counter>,
        ballot: &[NewCandidate],
    ) -> Result<usize> {
        if candidates.find_one(None, None).await?.is_some() {
            debug!("Candidates already present, skipping seed");
            return Ok(0);
        }

        let mut seeded = Vec::with_capacity(ballot.len());
        for new_candidate in ballot {
            let id = Counter::next(counters, CANDIDATE_ID_COUNTER_ID).await?;
            seeded.push(Candidate {
                id,
                candidate: new_candidate.clone(),
            });
        }
        if !seeded.is_empty() {
            candidates.insert_many(&seeded, None).await?;
        }
        info!("Seeded {} candidates", seeded.len());
        Ok(seeded.len())
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
