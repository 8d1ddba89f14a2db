use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{fs, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Database, Document};
use crate::{
    error::StoreError,
    types::{Chirp, ChirpID, HashedPassword, Revocation, User, UserID},
};

/// A database kept in a single JSON file.
///
/// Every operation loads the whole document, works on it in memory and, if it
/// changed anything, writes the whole document back, all while holding the
/// store's lock: shared for reads, exclusive for writes. The lock covers the
/// document as a whole, so a chirp write also holds up user reads.
///
/// The lock is per handle. Two handles, or two processes, on the same file will
/// trample each other.
pub struct JsonStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonStore {
    /// Open the database at `path`, creating an empty document if there is none yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            lock: RwLock::new(()),
        };
        store.ensure_document().await?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_document(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().await;

        match fs::metadata(&self.path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "creating new database");
                self.save(&Document::default()).await
            }
            Err(e) => Err(e.into()),
        }
    }

    // A missing file reads as an empty document.
    async fn load(&self) -> Result<Document, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(e.into()),
        }
    }

    // Written next to the target and renamed over it, so readers never see half a document.
    // The temp name is unique per save. A dropped save can still finish its blocking rename.
    async fn save(&self, document: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_vec(document)?;
        let temp_path = self.temp_path();

        fs::write(&temp_path, &json).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(
            path = %self.path.display(),
            bytes = json.len(),
            users = document.users.len(),
            chirps = document.chirps.len(),
            "database written"
        );

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        PathBuf::from(name)
    }

    async fn read<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Document) -> Result<T, StoreError> + Send,
    {
        let _guard = self.lock.read().await;
        let document = self.load().await?;

        query(&document)
    }

    // Nothing is written when `update` fails.
    async fn write<T, F>(&self, update: F) -> Result<T, StoreError>
    where
        T: Send,
        F: FnOnce(&mut Document) -> Result<T, StoreError> + Send,
    {
        let _guard = self.lock.write().await;
        let mut document = self.load().await?;

        let result = update(&mut document)?;
        self.save(&document).await?;

        Ok(result)
    }
}

#[async_trait]
impl Database for JsonStore {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &HashedPassword,
    ) -> Result<User, StoreError> {
        self.write(|document| {
            if document.user_with_email(email).is_some() {
                return Err(StoreError::AlreadyExists);
            }

            let user = User {
                id: document.next_user_id(),
                email: email.to_string(),
                hashed_password: hashed_password.clone(),
                is_chirpy_red: false,
            };
            document.users.insert(user.id.0, user.clone());

            Ok(user)
        })
        .await
    }

    async fn get_user(&self, id: UserID) -> Result<User, StoreError> {
        self.read(|document| document.users.get(&id.0).cloned().ok_or(StoreError::NotFound))
            .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.read(|document| {
            document
                .user_with_email(email)
                .cloned()
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn update_user(
        &self,
        id: UserID,
        email: &str,
        hashed_password: &HashedPassword,
    ) -> Result<User, StoreError> {
        self.write(|document| {
            if !document.users.contains_key(&id.0) {
                return Err(StoreError::NotFound);
            }
            if let Some(other) = document.user_with_email(email) {
                if other.id != id {
                    return Err(StoreError::AlreadyExists);
                }
            }

            let user = document.users.get_mut(&id.0).ok_or(StoreError::NotFound)?;
            user.email = email.to_string();
            user.hashed_password = hashed_password.clone();

            Ok(user.clone())
        })
        .await
    }

    async fn upgrade_user(&self, id: UserID) -> Result<User, StoreError> {
        self.write(|document| {
            let user = document.users.get_mut(&id.0).ok_or(StoreError::NotFound)?;
            user.is_chirpy_red = true;

            Ok(user.clone())
        })
        .await
    }

    async fn create_chirp(&self, body: &str, author_id: UserID) -> Result<Chirp, StoreError> {
        self.write(|document| {
            let chirp = Chirp {
                id: document.next_chirp_id(),
                body: body.to_string(),
                author_id: Some(author_id),
            };
            document.chirps.insert(chirp.id.0, chirp.clone());

            Ok(chirp)
        })
        .await
    }

    async fn list_chirps(&self) -> Result<Vec<Chirp>, StoreError> {
        self.read(|document| Ok(document.chirps.values().cloned().collect()))
            .await
    }

    async fn get_chirp(&self, id: ChirpID) -> Result<Chirp, StoreError> {
        self.read(|document| {
            document
                .chirps
                .get(&id.0)
                .cloned()
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn delete_chirp(&self, id: ChirpID) -> Result<(), StoreError> {
        self.write(|document| {
            document.chirps.remove(&id.0);
            Ok(())
        })
        .await
    }

    async fn revoke_token(
        &self,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();

        self.write(|document| {
            document.prune_revocations(now);
            document.revocations.insert(
                token_id.to_string(),
                Revocation {
                    token_id: token_id.to_string(),
                    revoked_at: now,
                    expires_at,
                },
            );

            Ok(())
        })
        .await
    }

    async fn is_token_revoked(&self, token_id: &str) -> Result<bool, StoreError> {
        self.read(|document| Ok(document.revocations.contains_key(token_id)))
            .await
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().await;

        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.save(&Document::default()).await?;

        info!(path = %self.path.display(), "database reset");

        Ok(())
    }
}
