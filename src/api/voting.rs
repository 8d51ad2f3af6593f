use mongodb::Client;
use rocket::{response::Redirect, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{candidate::CandidateDesc, results::ResultsView},
    auth::AuthToken,
    db::{
        candidate::{Candidate, CandidateId},
        user::User,
    },
    mongodb::Coll,
    vote::{cast_vote, VoteOutcome},
};

pub fn routes() -> Vec<Route> {
    routes![candidates, vote, results]
}

#[get("/candidates")]
pub async fn candidates(
    _token: AuthToken,
    ballot: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDesc>>> {
    let all = Candidate::all(&ballot).await?;
    Ok(Json(all.into_iter().map(CandidateDesc::from).collect()))
}

/// Cast the signed-in user's vote. Voting again is silently ignored.
#[post("/vote/<candidate_id>")]
pub async fn vote(
    token: AuthToken,
    candidate_id: CandidateId,
    db_client: &State<Client>,
    users: Coll<User>,
    ballot: Coll<Candidate>,
) -> Result<Redirect> {
    let outcome = cast_vote(db_client, &users, &ballot, token.id, candidate_id).await?;
    if outcome == VoteOutcome::AlreadyVoted {
        info!("Repeat vote from user {} ignored", token.id);
    }
    Ok(Redirect::to(uri!(results)))
}

#[get("/results")]
pub async fn results(
    _token: AuthToken,
    users: Coll<User>,
    ballot: Coll<Candidate>,
) -> Result<Json<ResultsView>> {
    let view = ResultsView::load(&users, &ballot).await?;
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::model::api::results::VoterDesc;

    use super::*;

    async fn tester(users: &Coll<User>) -> User {
        users
            .find_one(doc! { "email": "tester@whitematrix.com" }, None)
            .await
            .unwrap()
            .unwrap()
    }

    #[backend_test(user)]
    async fn list_candidates(client: Client) {
        let response = client.get(uri!(candidates)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let list: Vec<CandidateDesc> = response.into_json().await.unwrap();
        let names: Vec<_> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Angel Reji", "Dijo Joshi"]);
        assert!(list.iter().all(|c| c.vote_count == 0));
    }

    #[backend_test]
    async fn protected_routes_need_a_session(client: Client, ballot: Coll<Candidate>) {
        assert_eq!(
            Status::Unauthorized,
            client.get(uri!(candidates)).dispatch().await.status()
        );
        assert_eq!(
            Status::Unauthorized,
            client.get(uri!(results)).dispatch().await.status()
        );
        assert_eq!(
            Status::Unauthorized,
            client.post(uri!(vote(1))).dispatch().await.status()
        );

        let total: u32 = Candidate::all(&ballot)
            .await
            .unwrap()
            .iter()
            .map(|c| c.vote_count)
            .sum();
        assert_eq!(total, 0);
    }

    #[backend_test(user)]
    async fn vote_once_then_ignored(client: Client, users: Coll<User>, ballot: Coll<Candidate>) {
        let response = client.post(uri!(vote(1))).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(
            response.headers().get_one("Location"),
            Some(uri!(results).to_string().as_str())
        );
        assert!(tester(&users).await.has_voted);

        // A second vote for someone else changes nothing.
        let response = client.post(uri!(vote(2))).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());

        let tallies: Vec<_> = Candidate::all(&ballot)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.vote_count)
            .collect();
        assert_eq!(tallies, vec![1, 0]);
    }

    #[backend_test(user)]
    async fn vote_for_unknown_candidate(
        client: Client,
        users: Coll<User>,
        ballot: Coll<Candidate>,
    ) {
        let response = client.post(uri!(vote(99))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        assert!(!tester(&users).await.has_voted);

        let total: u32 = Candidate::all(&ballot)
            .await
            .unwrap()
            .iter()
            .map(|c| c.vote_count)
            .sum();
        assert_eq!(total, 0);
    }

    #[backend_test(user)]
    async fn results_list_voters_and_tallies(client: Client) {
        let response = client.get(uri!(results)).dispatch().await;
        let before: ResultsView = response.into_json().await.unwrap();
        assert!(before.voters.is_empty());

        client.post(uri!(vote(2))).dispatch().await;

        let response = client.get(uri!(results)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let after: ResultsView = response.into_json().await.unwrap();
        assert_eq!(
            after.voters,
            vec![VoterDesc {
                name: "Internal Tester".to_string(),
                email: "tester@whitematrix.com".to_string(),
            }]
        );
        let tallies: Vec<_> = after.candidates.iter().map(|c| c.vote_count).collect();
        assert_eq!(tallies, vec![0, 1]);
    }
}
