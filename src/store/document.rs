use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Chirp, ChirpID, Revocation, User, UserID};

/// The whole database as it is written to disk.
///
/// Map keys are the entity ids; JSON renders them as decimal strings. Users and
/// chirps have separate id spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Document {
    #[serde(default)]
    pub chirps: BTreeMap<u64, Chirp>,
    #[serde(default)]
    pub users: BTreeMap<u64, User>,
    #[serde(default)]
    pub revocations: BTreeMap<String, Revocation>,
    #[serde(default)]
    pub ids: IdCounters,
}

/// The last id handed out for each collection. Persisted so that ids are never
/// reused, even after the entity holding them is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IdCounters {
    pub users: u64,
    pub chirps: u64,
}

impl Document {
    pub fn next_user_id(&mut self) -> UserID {
        self.ids.users = next_id(self.ids.users, &self.users);
        UserID(self.ids.users)
    }

    pub fn next_chirp_id(&mut self) -> ChirpID {
        self.ids.chirps = next_id(self.ids.chirps, &self.chirps);
        ChirpID(self.ids.chirps)
    }

    pub fn user_with_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|user| user.email == email)
    }

    /// Drop revocations for tokens that have expired on their own.
    pub fn prune_revocations(&mut self, now: DateTime<Utc>) {
        self.revocations.retain(|_, revocation| revocation.expires_at > now);
    }
}

// Documents written before the counters existed only have their keys to go by.
fn next_id<T>(counter: u64, existing: &BTreeMap<u64, T>) -> u64 {
    let highest_key = existing.keys().next_back().copied().unwrap_or(0);
    counter.max(highest_key) + 1
}
