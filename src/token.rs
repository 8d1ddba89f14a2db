use std::time::Duration;

use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AuthError, types::UserID};

/// Upper bound (and default) for the lifetime of an access token handed out at login.
pub const MAX_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);
/// Lifetime of access tokens minted from a refresh token.
pub const REFRESHED_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);
pub const REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(180 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// The `iss` claim carried by tokens of this kind.
    pub fn issuer(self) -> &'static str {
        match self {
            TokenKind::Access => "chirpy-access",
            TokenKind::Refresh => "chirpy-refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    fn new(user_id: UserID, kind: TokenKind, lifetime: Duration) -> Self {
        let now = Utc::now().timestamp();

        Self {
            iss: kind.issuer().to_string(),
            sub: user_id.to_string(),
            iat: now,
            exp: now + lifetime.as_secs() as i64,
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn user_id(&self) -> Result<UserID, AuthError> {
        self.sub
            .parse()
            .map(UserID)
            .map_err(|_| AuthError::InvalidToken { source: None })
    }

    pub fn expires_at(&self) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn require_kind(&self, kind: TokenKind) -> Result<(), AuthError> {
        if self.iss == kind.issuer() {
            Ok(())
        } else {
            Err(AuthError::WrongIssuer)
        }
    }
}

/// Issue an access token. A `lifetime` of zero, or one longer than
/// [MAX_ACCESS_TOKEN_LIFETIME], is replaced by exactly that maximum.
pub fn issue_access_token(
    user_id: UserID,
    secret: &str,
    lifetime: Duration,
) -> Result<String, AuthError> {
    let lifetime = if lifetime.is_zero() || lifetime > MAX_ACCESS_TOKEN_LIFETIME {
        MAX_ACCESS_TOKEN_LIFETIME
    } else {
        lifetime
    };

    sign(&Claims::new(user_id, TokenKind::Access, lifetime), secret)
}

pub fn issue_refresh_token(user_id: UserID, secret: &str) -> Result<String, AuthError> {
    sign(
        &Claims::new(user_id, TokenKind::Refresh, REFRESH_TOKEN_LIFETIME),
        secret,
    )
}

/// Verify signature and expiry, returning the subject. The issuer is not
/// looked at; use [validate_access_token] to authorize requests.
pub fn validate_token(token: &str, secret: &str) -> Result<String, AuthError> {
    Ok(decode_claims(token, secret)?.sub)
}

/// Verify a token presented to an authenticated endpoint. Refresh tokens are
/// rejected with [AuthError::WrongIssuer].
pub fn validate_access_token(token: &str, secret: &str) -> Result<UserID, AuthError> {
    let claims = decode_claims(token, secret)?;
    claims.require_kind(TokenKind::Access)?;

    claims.user_id()
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let claims = decode_claims(token, secret)?;
    claims.require_kind(TokenKind::Refresh)?;

    Ok(claims)
}

/// Trade a refresh token for a new access token valid for
/// [REFRESHED_ACCESS_TOKEN_LIFETIME]. Revocation is checked by the caller.
pub fn exchange_refresh_token(token: &str, secret: &str) -> Result<String, AuthError> {
    let user_id = validate_refresh_token(token, secret)?.user_id()?;

    issue_access_token(user_id, secret, REFRESHED_ACCESS_TOKEN_LIFETIME)
}

pub(crate) fn sign(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|source| AuthError::Signing { source })
}

pub(crate) fn decode_claims(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|source| AuthError::InvalidToken {
        source: Some(source),
    })?;

    Ok(token.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "a secret only the tests know";

    fn lifetime_of(token: &str) -> i64 {
        let claims = decode_claims(token, SECRET).unwrap();
        claims.exp - claims.iat
    }

    #[test]
    fn access_token_round_trips_subject() {
        let token = issue_access_token(UserID(7), SECRET, Duration::from_secs(60)).unwrap();

        assert_eq!(validate_token(&token, SECRET).unwrap(), "7");
        assert_eq!(validate_access_token(&token, SECRET).unwrap(), UserID(7));
    }

    #[test]
    fn zero_lifetime_defaults_to_a_day() {
        let token = issue_access_token(UserID(1), SECRET, Duration::ZERO).unwrap();

        assert_eq!(lifetime_of(&token), 24 * 60 * 60);
    }

    #[test]
    fn long_lifetime_is_clamped_to_a_day() {
        let token =
            issue_access_token(UserID(1), SECRET, Duration::from_secs(100 * 60 * 60)).unwrap();

        assert_eq!(lifetime_of(&token), 24 * 60 * 60);
    }

    #[test]
    fn short_lifetime_is_kept() {
        let token = issue_access_token(UserID(1), SECRET, Duration::from_secs(90)).unwrap();

        assert_eq!(lifetime_of(&token), 90);
    }

    #[test]
    fn expired_token_is_invalid() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: TokenKind::Access.issuer().into(),
            sub: "1".into(),
            iat: now - 120,
            exp: now - 60,
            jti: "expired".into(),
        };
        let token = sign(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[test]
    fn token_signed_with_another_secret_is_invalid() {
        let token = issue_access_token(UserID(1), "someone else", Duration::ZERO).unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            validate_token("not.a.jwt", SECRET),
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let token = issue_refresh_token(UserID(3), SECRET).unwrap();

        assert_eq!(validate_token(&token, SECRET).unwrap(), "3");
        assert!(matches!(
            validate_access_token(&token, SECRET),
            Err(AuthError::WrongIssuer)
        ));
        assert_eq!(lifetime_of(&token), REFRESH_TOKEN_LIFETIME.as_secs() as i64);
    }

    #[test]
    fn exchanging_an_access_token_is_wrong_issuer() {
        let token = issue_access_token(UserID(3), SECRET, Duration::ZERO).unwrap();

        assert!(matches!(
            exchange_refresh_token(&token, SECRET),
            Err(AuthError::WrongIssuer)
        ));
    }

    #[test]
    fn exchange_mints_an_hour_long_access_token() {
        let refresh = issue_refresh_token(UserID(5), SECRET).unwrap();

        let access = exchange_refresh_token(&refresh, SECRET).unwrap();

        assert_eq!(validate_access_token(&access, SECRET).unwrap(), UserID(5));
        assert_eq!(lifetime_of(&access), 60 * 60);
    }

    #[test]
    fn tokens_get_distinct_ids() {
        let first = issue_refresh_token(UserID(5), SECRET).unwrap();
        let second = issue_refresh_token(UserID(5), SECRET).unwrap();

        assert_ne!(
            validate_refresh_token(&first, SECRET).unwrap().jti,
            validate_refresh_token(&second, SECRET).unwrap().jti
        );
    }

    #[test]
    fn non_numeric_subject_is_invalid() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: TokenKind::Access.issuer().into(),
            sub: "bob".into(),
            iat: now,
            exp: now + 60,
            jti: "bob".into(),
        };
        let token = sign(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_access_token(&token, SECRET),
            Err(AuthError::InvalidToken { source: None })
        ));
    }
}
