use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[repr(transparent)]
pub struct UserID(pub u64);

impl fmt::Display for UserID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[repr(transparent)]
pub struct ChirpID(pub u64);

impl fmt::Display for ChirpID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An encoded argon2 digest. The `Debug` output is redacted so digests never end up in logs.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[repr(transparent)]
pub struct HashedPassword(pub String);

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword(********)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: UserID,
    pub email: String,
    pub hashed_password: HashedPassword,
    #[serde(default)]
    pub is_chirpy_red: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Chirp {
    pub id: ChirpID,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserID>,
}

/// A refresh token that may no longer be exchanged, kept until its natural expiry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Revocation {
    pub token_id: String,
    pub revoked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The user as it is shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserView {
    pub id: UserID,
    pub email: String,
    pub is_chirpy_red: bool,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_chirpy_red: user.is_chirpy_red,
        }
    }
}
