use std::{convert::Infallible, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::error;
use warp::{
    http::{HeaderMap, StatusCode},
    path, Filter, Rejection, Reply,
};

use crate::{
    auth::{Auth, AuthConfig},
    chirps::{ChirpFilter, Chirps, SortOrder},
    error::{ApiError, AuthError, StoreError},
    store::Database,
    types::{Chirp, ChirpID, UserID, UserView},
};

const USER_UPGRADED_EVENT: &str = "user.upgraded";

/// Everything the handlers need, cheap to clone into each filter.
#[derive(Clone)]
pub struct AppState {
    pub auth: Auth,
    pub chirps: Chirps,
    pub db: Arc<dyn Database>,
    /// Enables the admin reset endpoint.
    pub debug: bool,
}

impl AppState {
    pub fn new(config: AuthConfig, db: Arc<dyn Database>, debug: bool) -> Self {
        Self {
            auth: Auth::new(config, db.clone()),
            chirps: Chirps::new(db.clone()),
            db,
            debug,
        }
    }
}

pub fn build_api_route_filter(
    state: &AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let healthz = path!("api" / "healthz").and(warp::get()).map(|| "OK");

    let create_user = path!("api" / "users")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(user_create);

    let update_user = path!("api" / "users")
        .and(warp::put())
        .and(with_user(state.clone()))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(user_update);

    let login = path!("api" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(user_login);

    let refresh = path!("api" / "refresh")
        .and(warp::post())
        .and(warp::header::headers_cloned())
        .and(with_state(state.clone()))
        .and_then(token_refresh);

    let revoke = path!("api" / "revoke")
        .and(warp::post())
        .and(warp::header::headers_cloned())
        .and(with_state(state.clone()))
        .and_then(token_revoke);

    let create_chirp = path!("api" / "chirps")
        .and(warp::post())
        .and(with_user(state.clone()))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(chirp_create);

    let list_chirps = path!("api" / "chirps")
        .and(warp::get())
        .and(warp::query::<ListChirpsQuery>())
        .and(with_state(state.clone()))
        .and_then(chirps_list);

    let get_chirp = path!("api" / "chirps" / u64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(chirp_get);

    let delete_chirp = path!("api" / "chirps" / u64)
        .and(warp::delete())
        .and(with_user(state.clone()))
        .and(with_state(state.clone()))
        .and_then(chirp_delete);

    let polka_webhook = path!("api" / "polka" / "webhooks")
        .and(warp::post())
        .and(warp::header::headers_cloned())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(polka_webhook);

    let reset = path!("admin" / "reset")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(admin_reset);

    healthz
        .or(create_user)
        .or(update_user)
        .or(login)
        .or(refresh)
        .or(revoke)
        .or(create_chirp)
        .or(list_chirps)
        .or(get_chirp)
        .or(delete_chirp)
        .or(polka_webhook)
        .or(reset)
}

/// Resolve the bearer access token to the calling user, rejecting the request otherwise.
pub fn with_user(state: AppState) -> impl Filter<Extract = (UserID,), Error = Rejection> + Clone {
    warp::header::headers_cloned()
        .and(with_state(state))
        .and_then(user_auth_check)
}

pub async fn handle_api_errors(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(api_error) = err.find::<ApiError>() {
        let status = status_for(api_error);

        let message = if status.is_server_error() {
            error!(error = ?api_error, "request failed");
            "an unknown error has occurred".to_string()
        } else {
            api_error.to_string()
        };

        return Ok(warp::reply::with_status(
            warp::reply::json(&ErrorResponse { error: message }),
            status,
        ));
    }

    Err(err)
}

fn status_for(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Validation(_) => StatusCode::BAD_REQUEST,
        ApiError::Forbidden => StatusCode::FORBIDDEN,
        ApiError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        ApiError::Store(StoreError::AlreadyExists) => StatusCode::CONFLICT,
        ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ApiError::Auth(AuthError::Hashing { .. } | AuthError::Signing { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

async fn user_create(input: CredentialsRequest, state: AppState) -> Result<impl Reply, Rejection> {
    let user = state.auth.register(&input.email, &input.password).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&UserView::from(user)),
        StatusCode::CREATED,
    ))
}

async fn user_update(
    user_id: UserID,
    input: CredentialsRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let user = state
        .auth
        .update_user(user_id, &input.email, &input.password)
        .await?;

    Ok(warp::reply::json(&UserView::from(user)))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub expires_in_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserView,
    pub token: String,
    pub refresh_token: String,
}

async fn user_login(input: LoginRequest, state: AppState) -> Result<impl Reply, Rejection> {
    let session = state
        .auth
        .login(
            &input.email,
            &input.password,
            input.expires_in_seconds.map(Duration::from_secs),
        )
        .await?;

    Ok(warp::reply::json(&LoginResponse {
        user: session.user.into(),
        token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

async fn token_refresh(headers: HeaderMap, state: AppState) -> Result<impl Reply, Rejection> {
    let token = state.auth.refresh(&headers).await?;

    Ok(warp::reply::json(&TokenResponse { token }))
}

async fn token_revoke(headers: HeaderMap, state: AppState) -> Result<impl Reply, Rejection> {
    state.auth.revoke(&headers).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ChirpRequest {
    pub body: String,
}

async fn chirp_create(
    user_id: UserID,
    input: ChirpRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let chirp = state.chirps.post(user_id, &input.body).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&chirp),
        StatusCode::CREATED,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListChirpsQuery {
    pub author_id: Option<u64>,
    pub sort: Option<SortOrder>,
}

async fn chirps_list(query: ListChirpsQuery, state: AppState) -> Result<impl Reply, Rejection> {
    let filter = ChirpFilter {
        author_id: query.author_id.map(UserID),
        sort: query.sort.unwrap_or_default(),
    };
    let chirps: Vec<Chirp> = state.chirps.list(&filter).await?;

    Ok(warp::reply::json(&chirps))
}

async fn chirp_get(id: u64, state: AppState) -> Result<impl Reply, Rejection> {
    let chirp = state.chirps.get(ChirpID(id)).await?;

    Ok(warp::reply::json(&chirp))
}

async fn chirp_delete(id: u64, user_id: UserID, state: AppState) -> Result<impl Reply, Rejection> {
    state.chirps.delete(user_id, ChirpID(id)).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub user_id: u64,
}

async fn polka_webhook(
    headers: HeaderMap,
    input: WebhookRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    state
        .auth
        .authenticate_webhook(&headers)
        .map_err(ApiError::from)?;

    if input.event == USER_UPGRADED_EVENT {
        state.auth.upgrade_user(UserID(input.data.user_id)).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn admin_reset(state: AppState) -> Result<impl Reply, Rejection> {
    if !state.debug {
        return Err(warp::reject::not_found());
    }

    state.db.reset().await.map_err(ApiError::from)?;

    Ok("database reset")
}

// Unwrap the bearer token and validate it
async fn user_auth_check(headers: HeaderMap, state: AppState) -> Result<UserID, Rejection> {
    Ok(state.auth.authenticate(&headers).map_err(ApiError::from)?)
}

// functor that adds the shared state into the filter chain
fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
