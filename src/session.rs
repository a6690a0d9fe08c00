//! Per-user session state.
//!
//! A session is a Redis hash `session:<user_id>` with one encrypted field
//! per flag. Updates upsert only the fields they set and refresh the
//! expiry in the same transaction, so two concurrent updates touching
//! different flags never overwrite each other.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use teloxide::types::UserId;
use thiserror::Error;
use tracing::{debug, error};

use crate::crypto::{Cipher, CryptoError};
use crate::store::{KeyValueStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("field '{field}': {source}")]
    Crypto { field: String, source: CryptoError },
    #[error("field '{field}': {source}")]
    Json { field: String, source: serde_json::Error },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub awaiting_id: bool,
    pub id_verified: bool,
    pub student_id: Option<String>,
    pub new_user: bool,
}

/// Where a user stands in the student-ID verification flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    /// Nothing recorded for this user.
    New,
    AwaitingId,
    /// Terminal.
    Verified,
    /// Has interacted, never asked for an ID.
    UnverifiedActive,
}

impl Session {
    pub fn state(&self) -> VerificationState {
        if self.id_verified {
            VerificationState::Verified
        } else if self.awaiting_id {
            VerificationState::AwaitingId
        } else if *self == Session::default() {
            VerificationState::New
        } else {
            VerificationState::UnverifiedActive
        }
    }
}

/// A partial session. Unset fields are left untouched in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub awaiting_id: Option<bool>,
    pub id_verified: Option<bool>,
    pub student_id: Option<String>,
    pub new_user: Option<bool>,
}

impl SessionUpdate {
    pub fn new_user() -> Self {
        Self {
            new_user: Some(true),
            ..Self::default()
        }
    }

    /// The AWAITING_ID → VERIFIED transition.
    pub fn verified(student_id: String) -> Self {
        Self {
            awaiting_id: Some(false),
            id_verified: Some(true),
            student_id: Some(student_id),
            ..Self::default()
        }
    }

    fn into_fields(self) -> Vec<(&'static str, Value)> {
        let mut fields = Vec::new();
        if let Some(v) = self.awaiting_id {
            fields.push(("awaiting_id", Value::Bool(v)));
        }
        if let Some(v) = self.id_verified {
            fields.push(("id_verified", Value::Bool(v)));
        }
        if let Some(v) = self.student_id {
            fields.push(("student_id", Value::String(v)));
        }
        if let Some(v) = self.new_user {
            fields.push(("new_user", Value::Bool(v)));
        }
        fields
    }
}

pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    cipher: Cipher,
    ttl: Duration,
}

fn session_key(user_id: UserId) -> String {
    format!("session:{}", user_id.0)
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, cipher: Cipher, ttl: Duration) -> Self {
        Self { store, cipher, ttl }
    }

    pub async fn load(&self, user_id: UserId) -> Result<Session, SessionError> {
        let raw = self.store.hash_get_all(&session_key(user_id)).await?;

        let mut map = Map::new();
        for (field, blob) in raw {
            let plain = match self.cipher.decrypt(&blob) {
                Ok(p) => p,
                Err(source) => return Err(SessionError::Crypto { field, source }),
            };
            let value: Value = match serde_json::from_slice(&plain) {
                Ok(v) => v,
                Err(source) => return Err(SessionError::Json { field, source }),
            };
            map.insert(field, value);
        }

        serde_json::from_value(Value::Object(map)).map_err(|source| SessionError::Json {
            field: "*".to_string(),
            source,
        })
    }

    pub async fn save(&self, user_id: UserId, update: SessionUpdate) -> Result<(), SessionError> {
        let mut fields = Vec::new();
        for (field, value) in update.into_fields() {
            // Serializing a serde_json::Value cannot fail.
            let plain = serde_json::to_vec(&value).unwrap_or_default();
            let blob = self.cipher.encrypt(&plain).map_err(|source| SessionError::Crypto {
                field: field.to_string(),
                source,
            })?;
            fields.push((field.to_string(), blob));
        }
        self.store
            .hash_set_with_ttl(&session_key(user_id), fields, self.ttl)
            .await?;
        Ok(())
    }

    /// Read a session, treating any failure as "no history".
    pub async fn get(&self, user_id: UserId) -> Session {
        match self.load(user_id).await {
            Ok(session) => session,
            Err(e) => {
                error!(user_id = user_id.0, "Session retrieval error: {e}");
                Session::default()
            }
        }
    }

    /// Apply a partial update. Failures are logged and otherwise dropped.
    pub async fn update(&self, user_id: UserId, update: SessionUpdate) {
        debug!(user_id = user_id.0, ?update, "Updating session");
        if let Err(e) = self.save(user_id, update).await {
            error!(user_id = user_id.0, "Session update error: {e}");
        }
    }
}
