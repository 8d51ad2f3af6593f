use serde::{Deserialize, Serialize};

use crate::model::db::candidate::{Candidate, CandidateId};

/// API-friendly representation of a candidate and their tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDesc {
    pub id: CandidateId,
    pub name: String,
    pub bio: String,
    pub link: String,
    pub vote_count: u32,
}

impl From<Candidate> for CandidateDesc {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.candidate.name,
            bio: candidate.candidate.bio,
            link: candidate.candidate.linkedin,
            vote_count: candidate.candidate.vote_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::db::candidate::CandidateCore;

    #[test]
    fn link_comes_from_linkedin() {
        let candidate = Candidate {
            id: 4,
            candidate: CandidateCore::new("A", "first", "https://example.com/a"),
        };
        let desc = CandidateDesc::from(candidate);
        assert_eq!(desc.id, 4);
        assert_eq!(desc.link, "https://example.com/a");
        assert_eq!(desc.vote_count, 0);
    }
}
