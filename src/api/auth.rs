use rocket::{
    http::{CookieJar, Status},
    response::{status::Custom, Redirect},
    Route, State,
};

use crate::{
    error::{Error, Result},
    identity::Provider,
    model::{
        auth::{AuthToken, LoginChallenge, AUTH_TOKEN_COOKIE, LOGIN_COOKIE},
        db::user::{NewUser, User},
        mongodb::Coll,
    },
    Config,
};

#[cfg(not(any(test, feature = "test-login")))]
pub fn routes() -> Vec<Route> {
    routes![login_google, auth_google, logout]
}

#[cfg(any(test, feature = "test-login"))]
pub fn routes() -> Vec<Route> {
    routes![login_google, auth_google, test_login, logout]
}

/// Start a provider login.
#[get("/login/google")]
pub async fn login_google(
    cookies: &CookieJar<'_>,
    provider: &State<Provider>,
    config: &State<Config>,
) -> Result<Redirect> {
    let challenge = LoginChallenge::new();
    let url = provider
        .authorization_url(&challenge.state, &challenge.nonce)
        .await?;
    cookies.add_private(challenge.into_cookie(config));
    Ok(Redirect::to(url))
}

/// The provider redirects here once the user has signed in.
///
/// Failures are answered with a bare status rather than through a catcher,
/// since catchers discard the removal of the login cookie.
#[allow(clippy::too_many_arguments)]
#[get("/auth/google?<code>&<state>&<error>")]
pub async fn auth_google(
    code: Option<&str>,
    state: Option<&str>,
    error: Option<&str>,
    challenge: LoginChallenge,
    cookies: &CookieJar<'_>,
    provider: &State<Provider>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    config: &State<Config>,
) -> std::result::Result<Redirect, Custom<()>> {
    // The login attempt is single-use whatever the outcome.
    cookies.remove_private(LOGIN_COOKIE);

    let callback = ProviderCallback { code, state, error };
    match complete_login(callback, &challenge, provider, &users, &new_users).await {
        Ok(user) => {
            info!("User {} signed in as {}", user.id, user.email);
            cookies.add(AuthToken::new(&user).into_cookie(config));
            Ok(Redirect::to(uri!(super::voting::candidates)))
        }
        Err(err) => {
            err.log("Google sign-in");
            Err(Custom(err.status(), ()))
        }
    }
}

/// Query parameters of the provider's redirect.
struct ProviderCallback<'a> {
    code: Option<&'a str>,
    state: Option<&'a str>,
    error: Option<&'a str>,
}

/// Check the redirect belongs to this login, redeem the code, and find or
/// create the user it identifies.
async fn complete_login(
    callback: ProviderCallback<'_>,
    challenge: &LoginChallenge,
    provider: &Provider,
    users: &Coll<User>,
    new_users: &Coll<NewUser>,
) -> Result<User> {
    challenge.check_state(callback.state.unwrap_or_default())?;

    // Google reports a declined consent screen as `error` with no `code`.
    let code = match (callback.code, callback.error) {
        (Some(code), _) => code,
        (None, Some(error)) => {
            return Err(Error::Authentication(format!("Sign-in declined: {error}")))
        }
        (None, None) => {
            return Err(Error::Authentication(
                "Provider redirect has no code".to_string(),
            ))
        }
    };

    let identity = provider.exchange_code(code, &challenge.nonce).await?;
    User::find_or_create(users, new_users, identity.into()).await
}

/// Sign in as a fixed internal tester without talking to the provider.
#[cfg(any(test, feature = "test-login"))]
#[get("/test_login")]
pub async fn test_login(
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    config: &State<Config>,
) -> Result<Redirect> {
    let tester = NewUser::new("tester@whitematrix.com", "Internal Tester");
    let user = User::find_or_create(&users, &new_users, tester).await?;
    warn!("Test login used for {}", user.email);

    cookies.add(AuthToken::new(&user).into_cookie(config));
    Ok(Redirect::to(uri!(super::voting::candidates)))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(AUTH_TOKEN_COOKIE);
    Status::Ok
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::local::asynchronous::Client;

    use crate::identity::fake::{FakeIdentityProvider, GOOD_CODE, OTHER_CODE};

    use super::*;

    /// Where the provider sends the user back to with an authorization code.
    fn callback(code: &str, state: &str) -> String {
        format!("/auth/google?code={code}&state={state}")
    }

    /// Start a login and return the state the provider would echo back.
    async fn start_login(client: &Client) -> String {
        let response = client.get(uri!(login_google)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        let location = response.headers().get_one("Location").unwrap();
        assert!(location.starts_with("https://idp.example.com/authorize"));

        let cookie = client.cookies().get_private(LOGIN_COOKIE).unwrap();
        let config = client.rocket().state::<Config>().unwrap();
        let challenge = LoginChallenge::from_cookie(&cookie, config).unwrap();
        assert!(location.contains(&challenge.state));
        challenge.state
    }

    #[backend_test]
    async fn provider_login_creates_user_and_session(client: Client, users: Coll<User>) {
        let state = start_login(&client).await;

        let response = client
            .get(callback(GOOD_CODE, &state))
            .dispatch()
            .await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(
            response.headers().get_one("Location"),
            Some(uri!(crate::api::voting::candidates).to_string().as_str())
        );
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        assert!(client.cookies().get_private(LOGIN_COOKIE).is_none());

        let identity = FakeIdentityProvider::identity();
        let user = users
            .find_one(doc! { "email": &identity.email }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.name, identity.name);
        assert!(!user.has_voted);
    }

    #[backend_test]
    async fn repeated_login_reuses_user(client: Client, users: Coll<User>) {
        for _ in 0..2 {
            let state = start_login(&client).await;
            client
                .get(callback(OTHER_CODE, &state))
                .dispatch()
                .await;
        }

        let email = FakeIdentityProvider::other_identity().email;
        let count = users
            .count_documents(doc! { "email": email }, None)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[backend_test]
    async fn wrong_state_is_rejected(client: Client, users: Coll<User>) {
        start_login(&client).await;

        let response = client
            .get(callback(GOOD_CODE, "forged"))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());
        assert!(client.cookies().get_private(LOGIN_COOKIE).is_none());
        assert_eq!(users.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn rejected_code_is_unauthorized(client: Client, users: Coll<User>) {
        let state = start_login(&client).await;

        let response = client
            .get(callback("bogus", &state))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());
        assert_eq!(users.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn declined_consent_is_unauthorized(client: Client, users: Coll<User>) {
        let state = start_login(&client).await;

        let response = client
            .get(format!("/auth/google?error=access_denied&state={state}"))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());
        assert!(client.cookies().get_private(LOGIN_COOKIE).is_none());
        assert_eq!(users.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn callback_without_code_or_state_is_unauthorized(client: Client) {
        start_login(&client).await;

        let response = client.get("/auth/google").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
        assert!(client.cookies().get_private(LOGIN_COOKIE).is_none());
    }

    #[backend_test]
    async fn callback_without_login_is_unauthorized(client: Client) {
        let response = client
            .get(callback(GOOD_CODE, "anything"))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn test_login_signs_in_tester(client: Client, users: Coll<User>) {
        let response = client.get(uri!(test_login)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let tester = users
            .find_one(doc! { "email": "tester@whitematrix.com" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tester.name, "Internal Tester");
    }

    #[backend_test(user)]
    async fn logout_clears_session(client: Client) {
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.delete(uri!(logout)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());

        let response = client
            .get(uri!(crate::api::voting::candidates))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
