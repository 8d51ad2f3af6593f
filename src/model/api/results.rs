use mongodb::{bson::doc, options::FindOptions};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    api::candidate::CandidateDesc,
    db::{candidate::Candidate, user::User},
    mongodb::Coll,
};

/// Someone who has voted. Who they voted for is never recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDesc {
    pub name: String,
    pub email: String,
}

impl From<User> for VoterDesc {
    fn from(user: User) -> Self {
        Self {
            name: user.user.name,
            email: user.user.email,
        }
    }
}

/// The results page: who has voted, and the standing of every candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsView {
    pub voters: Vec<VoterDesc>,
    pub candidates: Vec<CandidateDesc>,
}

impl ResultsView {
    /// Build the view from the current state of the store.
    pub async fn load(users: &Coll<User>, candidates: &Coll<Candidate>) -> Result<Self> {
        let options = FindOptions::builder().sort(doc! { "email": 1 }).build();
        let voters: Vec<User> = users
            .find(doc! { "has_voted": true }, options)
            .await?
            .try_collect()
            .await?;
        let candidates = Candidate::all(candidates).await?;

        Ok(Self {
            voters: voters.into_iter().map(VoterDesc::from).collect(),
            candidates: candidates.into_iter().map(CandidateDesc::from).collect(),
        })
    }
}
