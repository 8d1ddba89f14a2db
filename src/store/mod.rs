//! Persistence for users, chirps and revoked refresh tokens.
//!
//! The only implementation is [JsonStore], which keeps everything in one JSON
//! document on disk. Domain services hold an `Arc<dyn Database>` so tests can
//! swap in their own storage.

mod document;
mod json_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use document::{Document, IdCounters};
pub use json_store::JsonStore;

use crate::{
    error::StoreError,
    types::{Chirp, ChirpID, HashedPassword, User, UserID},
};

#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Create a user. Fails with [StoreError::AlreadyExists] if the email is taken.
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &HashedPassword,
    ) -> Result<User, StoreError>;

    async fn get_user(&self, id: UserID) -> Result<User, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Replace the email and password of an existing user.
    async fn update_user(
        &self,
        id: UserID,
        email: &str,
        hashed_password: &HashedPassword,
    ) -> Result<User, StoreError>;

    /// Mark a user as a Chirpy Red member.
    async fn upgrade_user(&self, id: UserID) -> Result<User, StoreError>;

    async fn create_chirp(&self, body: &str, author_id: UserID) -> Result<Chirp, StoreError>;

    /// All chirps, in no particular order.
    async fn list_chirps(&self) -> Result<Vec<Chirp>, StoreError>;

    async fn get_chirp(&self, id: ChirpID) -> Result<Chirp, StoreError>;

    /// Remove a chirp. Removing a chirp that does not exist succeeds.
    async fn delete_chirp(&self, id: ChirpID) -> Result<(), StoreError>;

    async fn revoke_token(
        &self,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn is_token_revoked(&self, token_id: &str) -> Result<bool, StoreError>;

    /// Throw away all data.
    async fn reset(&self) -> Result<(), StoreError>;
}
