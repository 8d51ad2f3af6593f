use rocket::{serde::json::Json, Route};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    api::stats::{load_stats, Stats},
    db::candidate::Candidate,
    mongodb::Coll,
};

pub fn routes() -> Vec<Route> {
    routes![index, stats]
}

/// Where a client should send the user to sign in.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub login: String,
}

#[get("/")]
pub fn index() -> Json<EntryPoint> {
    Json(EntryPoint {
        login: uri!(super::auth::login_google).to_string(),
    })
}

#[get("/stats")]
pub async fn stats(ballot: Coll<Candidate>) -> Result<Json<Stats>> {
    Ok(Json(load_stats(&ballot).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::model::db::candidate::CandidateId;

    use super::*;

    #[backend_test]
    async fn index_points_at_login(client: Client) {
        let response = client.get(uri!(index)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let entry: EntryPoint = response.into_json().await.unwrap();
        assert_eq!(entry.login, "/login/google");
    }

    #[backend_test]
    async fn stats_are_public(client: Client) {
        let response = client.get(uri!(stats)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let stats: Stats = response.into_json().await.unwrap();
        let expected: Stats = [("Angel Reji".to_string(), 0), ("Dijo Joshi".to_string(), 0)]
            .into_iter()
            .collect();
        assert_eq!(stats, expected);
    }

    #[backend_test(user)]
    async fn stats_after_vote(client: Client) {
        client
            .post(uri!(crate::api::voting::vote(1)))
            .dispatch()
            .await;
        client
            .post(uri!(crate::api::voting::vote(2)))
            .dispatch()
            .await;

        let stats: Stats = client
            .get(uri!(stats))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(stats.get("Angel Reji"), Some(&1));
        assert_eq!(stats.get("Dijo Joshi"), Some(&0));
    }
}
