use warp::http::{header::AUTHORIZATION, HeaderMap};

use crate::error::AuthError;

const BEARER_SCHEME: &str = "Bearer";
const API_KEY_SCHEME: &str = "ApiKey";

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    credential(headers, BEARER_SCHEME)
}

/// Pull the key out of an `Authorization: ApiKey <key>` header.
pub fn api_key(headers: &HeaderMap) -> Result<&str, AuthError> {
    credential(headers, API_KEY_SCHEME)
}

// The scheme is matched case-insensitively, the credential must be exactly one word.
fn credential<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedAuthHeader)?;

    match value.split(' ').collect::<Vec<_>>().as_slice() {
        [given_scheme, credential]
            if given_scheme.eq_ignore_ascii_case(scheme) && !credential.is_empty() =>
        {
            Ok(*credential)
        }
        _ => Err(AuthError::MalformedAuthHeader),
    }
}
