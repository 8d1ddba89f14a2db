use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::{
    error::{ApiError, ValidationError},
    store::Database,
    types::{Chirp, ChirpID, UserID},
};

pub const MAX_CHIRP_LENGTH: usize = 140;

const PROFANE_WORDS: [&str; 3] = ["kerfuffle", "sharbert", "fornax"];
const CENSORED: &str = "****";

/// Check a chirp's length and censor it.
///
/// Length is counted in characters. Words are separated by single spaces and
/// matched case-insensitively, so "Fornax" is censored but "fornax!" is not.
pub fn validate_chirp(body: &str) -> Result<String, ValidationError> {
    let length = body.chars().count();
    if length > MAX_CHIRP_LENGTH {
        return Err(ValidationError::ChirpTooLong {
            length,
            max: MAX_CHIRP_LENGTH,
        });
    }

    Ok(censor(body))
}

fn censor(body: &str) -> String {
    body.split(' ')
        .map(|word| {
            if PROFANE_WORDS.contains(&word.to_lowercase().as_str()) {
                CENSORED
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct ChirpFilter {
    pub author_id: Option<UserID>,
    pub sort: SortOrder,
}

#[derive(Clone)]
pub struct Chirps {
    db: Arc<dyn Database>,
}

impl Chirps {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn post(&self, author_id: UserID, body: &str) -> Result<Chirp, ApiError> {
        let cleaned = validate_chirp(body)?;
        let chirp = self.db.create_chirp(&cleaned, author_id).await?;

        info!(chirp_id = %chirp.id, %author_id, "chirp created");

        Ok(chirp)
    }

    /// Chirps sorted by id. The store keeps no order of its own.
    pub async fn list(&self, filter: &ChirpFilter) -> Result<Vec<Chirp>, ApiError> {
        let mut chirps: Vec<_> = self
            .db
            .list_chirps()
            .await?
            .into_iter()
            .filter(|chirp| filter.author_id.is_none() || chirp.author_id == filter.author_id)
            .collect();

        match filter.sort {
            SortOrder::Asc => chirps.sort_by_key(|chirp| chirp.id),
            SortOrder::Desc => chirps.sort_by_key(|chirp| std::cmp::Reverse(chirp.id)),
        }

        Ok(chirps)
    }

    pub async fn get(&self, id: ChirpID) -> Result<Chirp, ApiError> {
        Ok(self.db.get_chirp(id).await?)
    }

    /// Delete a chirp on behalf of `user_id`, who has to be its author.
    pub async fn delete(&self, user_id: UserID, id: ChirpID) -> Result<(), ApiError> {
        let chirp = self.db.get_chirp(id).await?;
        if chirp.author_id != Some(user_id) {
            return Err(ApiError::Forbidden);
        }

        self.db.delete_chirp(id).await?;

        info!(chirp_id = %id, %user_id, "chirp deleted");

        Ok(())
    }
}
