//! Casting a vote: the one-way `has_voted` flip and the matching tally
//! increment, committed together.

use std::time::Duration;

use mongodb::{bson::doc, error::Error as DbError, Client, ClientSession};
use rand::Rng;
use rocket::tokio::time::sleep;

use crate::error::{Error, Result};
use crate::model::{
    db::{
        candidate::{Candidate, CandidateId},
        user::User,
    },
    mongodb::{
        is_transient_transaction_error, is_unknown_commit_result, u32_id_filter, Coll, Id,
    },
};

/// What happened to a vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was recorded.
    Counted,
    /// The user had already voted; nothing changed.
    AlreadyVoted,
}

/// How many times a vote is attempted before a write conflict is reported.
const MAX_ATTEMPTS: u32 = 8;

/// Upper bound on the random pause before retrying, per attempt so far.
const RETRY_JITTER_MS: u64 = 20;

/// Cast `voter`'s vote for `candidate_id`.
///
/// The user is flipped to voted only if they hadn't voted yet, and the
/// candidate's tally is incremented in the same transaction. An unknown
/// candidate aborts the transaction, leaving the user able to vote again.
///
/// Concurrent votes touching the same documents make all but one
/// transaction fail with a transient error. Those are retried from the
/// start, so a losing vote by another user is still counted and a losing
/// repeat by the same user becomes [`VoteOutcome::AlreadyVoted`].
pub async fn cast_vote(
    db_client: &Client,
    users: &Coll<User>,
    candidates: &Coll<Candidate>,
    voter: Id,
    candidate_id: CandidateId,
) -> Result<VoteOutcome> {
    let mut session = db_client.start_session(None).await?;

    for attempt in 1..=MAX_ATTEMPTS {
        match try_cast_vote(&mut session, users, candidates, voter, candidate_id).await {
            Err(Error::Db(err)) if is_transient_transaction_error(&err) => {
                debug!("Vote by user {voter} conflicted on attempt {attempt}: {err}");
                let max_pause = RETRY_JITTER_MS * u64::from(attempt);
                let pause = rand::thread_rng().gen_range(0..=max_pause);
                sleep(Duration::from_millis(pause)).await;
            }
            result => return result,
        }
    }

    warn!("Giving up on vote by user {voter} after {MAX_ATTEMPTS} conflicting attempts");
    Err(Error::Conflict(format!(
        "Vote by user {voter} kept conflicting with other votes"
    )))
}

/// One attempt at the vote transaction. Always leaves the session without
/// an active transaction.
async fn try_cast_vote(
    session: &mut ClientSession,
    users: &Coll<User>,
    candidates: &Coll<Candidate>,
    voter: Id,
    candidate_id: CandidateId,
) -> Result<VoteOutcome> {
    session.start_transaction(None).await?;

    match record_vote(session, users, candidates, voter, candidate_id).await {
        Ok(VoteOutcome::Counted) => {
            commit(session).await?;
            info!("User {voter} voted for candidate {candidate_id}");
            Ok(VoteOutcome::Counted)
        }
        Ok(VoteOutcome::AlreadyVoted) => {
            session.abort_transaction().await?;
            debug!("User {voter} already voted, ignoring vote for {candidate_id}");
            Ok(VoteOutcome::AlreadyVoted)
        }
        Err(err) => {
            // The server may already have aborted on a write conflict.
            if let Err(abort_err) = session.abort_transaction().await {
                debug!("Abort after failed vote also failed: {abort_err}");
            }
            Err(err)
        }
    }
}

/// Commit, retrying while the server can't say whether the commit happened.
async fn commit(session: &mut ClientSession) -> std::result::Result<(), DbError> {
    let mut attempts = 1;
    loop {
        match session.commit_transaction().await {
            Err(err) if is_unknown_commit_result(&err) && attempts < MAX_ATTEMPTS => {
                debug!("Commit result unknown, retrying: {err}");
                attempts += 1;
            }
            result => return result,
        }
    }
}

/// The writes inside the vote transaction.
async fn record_vote(
    session: &mut ClientSession,
    users: &Coll<User>,
    candidates: &Coll<Candidate>,
    voter: Id,
    candidate_id: CandidateId,
) -> Result<VoteOutcome> {
    // Compare-and-swap the user's vote status.
    let flipped = users
        .find_one_and_update_with_session(
            doc! { "_id": voter, "has_voted": false },
            doc! { "$set": { "has_voted": true } },
            None,
            session,
        )
        .await?;

    if flipped.is_none() {
        let exists = users
            .find_one_with_session(voter.as_doc(), None, session)
            .await?
            .is_some();
        return if exists {
            Ok(VoteOutcome::AlreadyVoted)
        } else {
            Err(Error::Unauthorized(format!("User {voter} does not exist")))
        };
    }

    let result = candidates
        .update_one_with_session(
            u32_id_filter(candidate_id),
            doc! { "$inc": { "vote_count": 1 } },
            None,
            session,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }

    Ok(VoteOutcome::Counted)
}
