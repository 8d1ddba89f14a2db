use std::{net::SocketAddr, sync::Arc};

use chirpy::{
    build_api_route_filter, handle_api_errors, store::JsonStore, AppState, AuthConfig, Chirp,
    LoginResponse, TokenResponse, UserView,
};
use reqwest::StatusCode;
use serde_json::json;
use tempfile::TempDir;
use warp::Filter;

const POLKA_KEY: &str = "f271c81ff7084ee5b99a5091b42d486e";

struct TestServer {
    base: String,
    _dir: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn start_server() -> anyhow::Result<TestServer> {
    let dir = tempfile::tempdir()?;
    let store = JsonStore::open(dir.path().join("database.json")).await?;

    let config = AuthConfig {
        token_secret: "this is a really bad secret".into(),
        polka_key: POLKA_KEY.into(),
    };
    let state = AppState::new(config, Arc::new(store), true);

    let routes = build_api_route_filter(&state).recover(handle_api_errors);
    let (address, server) =
        warp::serve(routes).bind_ephemeral("127.0.0.1:0".parse::<SocketAddr>()?);
    tokio::spawn(server);

    Ok(TestServer {
        base: format!("http://{address}"),
        _dir: dir,
    })
}

async fn login(
    client: &reqwest::Client,
    server: &TestServer,
    email: &str,
    password: &str,
) -> LoginResponse {
    let response = client
        .post(server.url("/api/login"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "failed to log in");

    response.json().await.unwrap()
}

#[tokio::test]
async fn chirp_lifecycle() {
    let server = start_server().await.unwrap();
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/users"))
        .json(&json!({"email": "a@x.com", "password": "pw"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "failed to register user");
    let user: UserView = response.json().await.unwrap();
    assert_eq!(user.id.0, 1);
    assert_eq!(user.email, "a@x.com");

    assert_eq!(
        client
            .post(server.url("/api/users"))
            .json(&json!({"email": "a@x.com", "password": "other"}))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::CONFLICT,
        "registering the same email twice should have been denied"
    );

    assert_eq!(
        client
            .post(server.url("/api/login"))
            .json(&json!({"email": "a@x.com", "password": "hunter1"}))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::UNAUTHORIZED,
        "login with an invalid password should have been denied"
    );

    let session = login(&client, &server, "a@x.com", "pw").await;
    assert_eq!(session.user, user);

    assert_eq!(
        client
            .post(server.url("/api/chirps"))
            .json(&json!({"body": "no token"}))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::UNAUTHORIZED,
        "posting without a token should have been denied"
    );

    assert_eq!(
        client
            .post(server.url("/api/chirps"))
            .bearer_auth("fake token")
            .json(&json!({"body": "bad token"}))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::UNAUTHORIZED,
        "posting with a bad token should have been denied"
    );

    assert_eq!(
        client
            .post(server.url("/api/chirps"))
            .bearer_auth(&session.token)
            .json(&json!({"body": "a".repeat(141)}))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::BAD_REQUEST,
        "overlong chirp should have been rejected"
    );

    let response = client
        .post(server.url("/api/chirps"))
        .bearer_auth(&session.token)
        .json(&json!({"body": "kerfuffle is bad"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "failed to post chirp");
    let chirp: Chirp = response.json().await.unwrap();
    assert_eq!(chirp.id.0, 1);
    assert_eq!(chirp.body, "**** is bad");
    assert_eq!(chirp.author_id, Some(user.id));

    let chirps: Vec<Chirp> = client
        .get(server.url("/api/chirps"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chirps, vec![chirp.clone()]);

    let fetched: Chirp = client
        .get(server.url("/api/chirps/1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, chirp);

    assert_eq!(
        client
            .delete(server.url("/api/chirps/1"))
            .bearer_auth(&session.token)
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::NO_CONTENT,
        "failed to delete chirp"
    );

    assert_eq!(
        client
            .get(server.url("/api/chirps/1"))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::NOT_FOUND,
        "deleted chirp should be gone"
    );
}

#[tokio::test]
async fn only_the_author_can_delete() {
    let server = start_server().await.unwrap();
    let client = reqwest::Client::new();
    for email in ["a@x.com", "b@x.com"] {
        client
            .post(server.url("/api/users"))
            .json(&json!({"email": email, "password": "pw"}))
            .send()
            .await
            .unwrap();
    }
    let author = login(&client, &server, "a@x.com", "pw").await;
    let other = login(&client, &server, "b@x.com", "pw").await;

    let chirp: Chirp = client
        .post(server.url("/api/chirps"))
        .bearer_auth(&author.token)
        .json(&json!({"body": "mine"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        client
            .delete(server.url(&format!("/api/chirps/{}", chirp.id)))
            .bearer_auth(&other.token)
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::FORBIDDEN
    );

    let by_author: Vec<Chirp> = client
        .get(server.url(&format!("/api/chirps?author_id={}", author.user.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_author, vec![chirp]);
}

#[tokio::test]
async fn update_user_requires_an_access_token() {
    let server = start_server().await.unwrap();
    let client = reqwest::Client::new();
    client
        .post(server.url("/api/users"))
        .json(&json!({"email": "a@x.com", "password": "pw"}))
        .send()
        .await
        .unwrap();
    let session = login(&client, &server, "a@x.com", "pw").await;

    assert_eq!(
        client
            .put(server.url("/api/users"))
            .bearer_auth(&session.refresh_token)
            .json(&json!({"email": "new@x.com", "password": "new"}))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::UNAUTHORIZED,
        "refresh tokens must not authorize requests"
    );

    let response = client
        .put(server.url("/api/users"))
        .bearer_auth(&session.token)
        .json(&json!({"email": "new@x.com", "password": "new"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user: UserView = response.json().await.unwrap();
    assert_eq!(user.email, "new@x.com");

    login(&client, &server, "new@x.com", "new").await;
}

#[tokio::test]
async fn refresh_and_revoke() {
    let server = start_server().await.unwrap();
    let client = reqwest::Client::new();
    client
        .post(server.url("/api/users"))
        .json(&json!({"email": "a@x.com", "password": "pw"}))
        .send()
        .await
        .unwrap();
    let session = login(&client, &server, "a@x.com", "pw").await;

    let response = client
        .post(server.url("/api/refresh"))
        .bearer_auth(&session.refresh_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed: TokenResponse = response.json().await.unwrap();

    assert_eq!(
        client
            .post(server.url("/api/chirps"))
            .bearer_auth(&refreshed.token)
            .json(&json!({"body": "hello"}))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::CREATED
    );

    assert_eq!(
        client
            .post(server.url("/api/revoke"))
            .bearer_auth(&session.refresh_token)
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::NO_CONTENT
    );

    assert_eq!(
        client
            .post(server.url("/api/refresh"))
            .bearer_auth(&session.refresh_token)
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::UNAUTHORIZED,
        "revoked refresh token should have been refused"
    );
}

#[tokio::test]
async fn polka_webhook_upgrades_users() {
    let server = start_server().await.unwrap();
    let client = reqwest::Client::new();
    client
        .post(server.url("/api/users"))
        .json(&json!({"email": "a@x.com", "password": "pw"}))
        .send()
        .await
        .unwrap();
    let upgrade = json!({"event": "user.upgraded", "data": {"user_id": 1}});

    assert_eq!(
        client
            .post(server.url("/api/polka/webhooks"))
            .header("Authorization", "ApiKey wrong")
            .json(&upgrade)
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::UNAUTHORIZED
    );

    assert_eq!(
        client
            .post(server.url("/api/polka/webhooks"))
            .header("Authorization", format!("ApiKey {POLKA_KEY}"))
            .json(&json!({"event": "user.payment_failed", "data": {"user_id": 1}}))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::NO_CONTENT
    );
    assert!(!login(&client, &server, "a@x.com", "pw").await.user.is_chirpy_red);

    assert_eq!(
        client
            .post(server.url("/api/polka/webhooks"))
            .header("Authorization", format!("ApiKey {POLKA_KEY}"))
            .json(&upgrade)
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::NO_CONTENT
    );
    assert!(login(&client, &server, "a@x.com", "pw").await.user.is_chirpy_red);

    assert_eq!(
        client
            .post(server.url("/api/polka/webhooks"))
            .header("Authorization", format!("ApiKey {POLKA_KEY}"))
            .json(&json!({"event": "user.upgraded", "data": {"user_id": 99}}))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn health_and_reset() {
    let server = start_server().await.unwrap();
    let client = reqwest::Client::new();

    let response = client.get(server.url("/api/healthz")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    client
        .post(server.url("/api/users"))
        .json(&json!({"email": "a@x.com", "password": "pw"}))
        .send()
        .await
        .unwrap();

    assert_eq!(
        client
            .post(server.url("/admin/reset"))
            .send()
            .await
            .unwrap()
            .status(),
        StatusCode::OK
    );

    let response = client
        .post(server.url("/api/users"))
        .json(&json!({"email": "a@x.com", "password": "pw"}))
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.status(),
        StatusCode::CREATED,
        "reset should have removed the first registration"
    );
    let user: UserView = response.json().await.unwrap();
    assert_eq!(user.id.0, 1);
}
