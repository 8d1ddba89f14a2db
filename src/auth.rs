use std::{sync::Arc, time::Duration};

use tracing::{info, warn};
use warp::http::HeaderMap;

use crate::{
    error::{ApiError, AuthError, StoreError, ValidationError},
    headers, password,
    store::Database,
    token,
    types::{User, UserID},
};

#[derive(Clone)]
pub struct AuthConfig {
    /// The secret used to sign every access and refresh token.
    /// If the secret changes, all currently authenticated sessions will be terminated.
    pub token_secret: String,
    /// The key Polka presents when calling the membership webhook.
    pub polka_key: String,
}

/// What a successful login hands back.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// User accounts and sessions.
#[derive(Clone)]
pub struct Auth {
    config: Arc<AuthConfig>,
    db: Arc<dyn Database>,
}

impl Auth {
    pub fn new(config: AuthConfig, db: Arc<dyn Database>) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<User, ApiError> {
        require_credentials(email, password)?;

        let hashed_password = password::hash_password(password)?;
        let user = self.db.create_user(email, &hashed_password).await?;

        info!(user_id = %user.id, "user registered");

        Ok(user)
    }

    /// Check the password and open a session. `expires_in` bounds the access
    /// token's lifetime; see [token::issue_access_token].
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        expires_in: Option<Duration>,
    ) -> Result<Session, ApiError> {
        let user = match self.db.get_user_by_email(email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AuthError::LoginFailed.into()),
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = password::verify_password(password, &user.hashed_password) {
            if matches!(e, AuthError::LoginFailed) {
                warn!(user_id = %user.id, "login with wrong password");
            }
            return Err(e.into());
        }

        let secret = &self.config.token_secret;
        let access_token =
            token::issue_access_token(user.id, secret, expires_in.unwrap_or_default())?;
        let refresh_token = token::issue_refresh_token(user.id, secret)?;

        Ok(Session {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Resolve the user behind an `Authorization: Bearer <access token>` header.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<UserID, AuthError> {
        let token = headers::bearer_token(headers)?;

        token::validate_access_token(token, &self.config.token_secret)
    }

    pub async fn update_user(
        &self,
        user_id: UserID,
        email: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        require_credentials(email, password)?;

        let hashed_password = password::hash_password(password)?;
        let user = self.db.update_user(user_id, email, &hashed_password).await?;

        info!(%user_id, "user updated");

        Ok(user)
    }

    /// Exchange the refresh token in the bearer header for a new access token.
    pub async fn refresh(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        let token = headers::bearer_token(headers)?;
        let claims = token::validate_refresh_token(token, &self.config.token_secret)?;

        if self.db.is_token_revoked(&claims.jti).await? {
            warn!(user_id = %claims.sub, "revoked refresh token presented");
            return Err(AuthError::Revoked.into());
        }

        Ok(token::exchange_refresh_token(token, &self.config.token_secret)?)
    }

    /// Revoke the refresh token in the bearer header. It stays on the denylist
    /// until it would have expired anyway.
    pub async fn revoke(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let token = headers::bearer_token(headers)?;
        let claims = token::validate_refresh_token(token, &self.config.token_secret)?;

        self.db.revoke_token(&claims.jti, claims.expires_at()).await?;

        info!(user_id = %claims.sub, "refresh token revoked");

        Ok(())
    }

    /// Check the `Authorization: ApiKey <key>` header of a webhook call.
    pub fn authenticate_webhook(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let key = headers::api_key(headers)?;

        if key == self.config.polka_key {
            Ok(())
        } else {
            warn!("webhook called with an unknown api key");
            Err(AuthError::InvalidApiKey)
        }
    }

    pub async fn upgrade_user(&self, user_id: UserID) -> Result<User, ApiError> {
        let user = self.db.upgrade_user(user_id).await?;

        info!(%user_id, "user upgraded to chirpy red");

        Ok(user)
    }
}

fn require_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::Malformed("email must not be empty".into()));
    }
    if password.is_empty() {
        return Err(ValidationError::Malformed("password must not be empty".into()));
    }

    Ok(())
}
