//! Durable, synchronous session persistence for one origin.
//!
//! [`LocalStorage`] is the storage medium every context of an origin shares;
//! [`SessionStore`] is a per-context handle that knows the two entries a
//! session occupies (`token` + `user`) and the decode rules. Persistence and
//! notification are deliberately separate: a successful `write` or `clear`
//! is followed by the caller publishing on the bus, never by the store.

use crate::session::{Profile, Session, credential_expired};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;

/// Storage entry holding the signed credential.
pub const TOKEN_KEY: &str = "token";
/// Storage entry holding the JSON-serialized profile.
pub const USER_KEY: &str = "user";

/// Some frontends end up persisting the literal string `undefined`; it is an
/// absent marker, not data.
const ABSENT_MARKER: &str = "undefined";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage is disabled")]
    Disabled,
    #[error("failed to encode profile")]
    Encode,
}

#[derive(Default)]
struct StorageInner {
    entries: HashMap<String, String>,
    quota: Option<usize>,
    disabled: bool,
}

impl StorageInner {
    fn used(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

/// Origin-shared key/value medium. Clones are handles onto the same storage,
/// the way every tab of an origin sees one `localStorage`.
#[derive(Clone, Default)]
pub struct LocalStorage {
    inner: Arc<Mutex<StorageInner>>,
}

impl LocalStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once the total payload exceeds `bytes`.
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        let storage = Self::new();
        storage.lock().quota = Some(bytes);
        storage
    }

    /// Storage that rejects every write, like a browser with storage off.
    #[must_use]
    pub fn disabled() -> Self {
        let storage = Self::new();
        storage.lock().disabled = true;
        storage
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StorageInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store one entry, like `localStorage.setItem`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when storage is disabled or the write
    /// would exceed the quota.
    pub fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if inner.disabled {
            return Err(PersistenceError::Disabled);
        }
        if let Some(quota) = inner.quota {
            let current = inner
                .entries
                .get(key)
                .map_or(0, |existing| key.len() + existing.len());
            if inner.used() - current + key.len() + value.len() > quota {
                return Err(PersistenceError::QuotaExceeded);
            }
        }
        inner.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().entries.get(key).cloned()
    }

    pub fn remove(&self, key: &str) {
        self.lock().entries.remove(key);
    }
}

/// Per-context handle over the origin's session entries.
#[derive(Clone)]
pub struct SessionStore {
    storage: LocalStorage,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Persist credential and profile together. If the second entry is
    /// rejected the first is rolled back so a partial pair is never visible.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the medium rejects the write.
    pub fn write(&self, session: &Session) -> Result<(), PersistenceError> {
        let user =
            serde_json::to_string(&session.profile).map_err(|_| PersistenceError::Encode)?;

        self.storage.set(TOKEN_KEY, &session.credential)?;
        if let Err(err) = self.storage.set(USER_KEY, &user) {
            self.storage.remove(TOKEN_KEY);
            return Err(err);
        }

        Ok(())
    }

    /// Read the current session, or `None` when logged out.
    ///
    /// Missing entries, the `undefined` marker, an unparseable profile and a
    /// credential with a readable expiry in the past all decode to `None`;
    /// whatever malformed data was found is cleared as a side effect. This
    /// never panics on stored data.
    #[must_use]
    pub fn read(&self) -> Option<Session> {
        let token = self.storage.get(TOKEN_KEY);
        let user = self.storage.get(USER_KEY);

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) => (token, user),
            (None, None) => return None,
            // Half a pair is malformed data, not a session.
            _ => {
                self.clear();
                return None;
            }
        };

        if token == ABSENT_MARKER || user == ABSENT_MARKER {
            self.clear();
            return None;
        }

        let profile: Profile = match serde_json::from_str(&user) {
            Ok(profile) => profile,
            Err(_) => {
                self.clear();
                return None;
            }
        };

        if credential_expired(&token) {
            self.clear();
            return None;
        }

        Some(Session {
            credential: token,
            profile,
        })
    }

    /// Remove both entries. Idempotent.
    pub fn clear(&self) {
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(USER_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use uuid::Uuid;

    fn session() -> Session {
        Session {
            credential: "signed.session.credential".to_string(),
            profile: Profile {
                id: Uuid::new_v4(),
                username: "alice".to_string(),
                role: Role::Student,
                display_name: "Alice Doe".to_string(),
                email: "alice@example.com".to_string(),
            },
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let store = SessionStore::new(LocalStorage::new());
        let session = session();

        store.write(&session).unwrap();
        assert_eq!(store.read(), Some(session));
    }

    #[test]
    fn read_on_empty_storage_is_none() {
        let store = SessionStore::new(LocalStorage::new());
        assert_eq!(store.read(), None);
    }

    #[test]
    fn token_without_user_is_absent_and_cleared() {
        let storage = LocalStorage::new();
        storage.set(TOKEN_KEY, "some-token").unwrap();

        let store = SessionStore::new(storage.clone());
        assert_eq!(store.read(), None);
        assert_eq!(storage.get(TOKEN_KEY), None);
    }

    #[test]
    fn user_without_token_is_absent_and_cleared() {
        let storage = LocalStorage::new();
        storage.set(USER_KEY, "{}").unwrap();

        let store = SessionStore::new(storage.clone());
        assert_eq!(store.read(), None);
        assert_eq!(storage.get(USER_KEY), None);
    }

    #[test]
    fn undefined_marker_is_absent() {
        let storage = LocalStorage::new();
        storage.set(TOKEN_KEY, "some-token").unwrap();
        storage.set(USER_KEY, "undefined").unwrap();

        let store = SessionStore::new(storage.clone());
        assert_eq!(store.read(), None);
        assert_eq!(storage.get(TOKEN_KEY), None);
        assert_eq!(storage.get(USER_KEY), None);
    }

    #[test]
    fn unparseable_profile_is_absent_and_cleared() {
        let storage = LocalStorage::new();
        storage.set(TOKEN_KEY, "some-token").unwrap();
        storage.set(USER_KEY, "{not json").unwrap();

        let store = SessionStore::new(storage.clone());
        assert_eq!(store.read(), None);
        assert_eq!(storage.get(USER_KEY), None);
    }

    #[test]
    fn unknown_stored_role_is_absent_and_cleared() {
        let storage = LocalStorage::new();
        storage.set(TOKEN_KEY, "some-token").unwrap();
        storage
            .set(
                USER_KEY,
                r#"{"id":"7f2c1e36-58a3-4e6f-9c85-0a8f6f1f9d55","username":"m","role":"superuser","displayName":"M","email":"m@x.io"}"#,
            )
            .unwrap();

        let store = SessionStore::new(storage.clone());
        assert_eq!(store.read(), None);
        assert_eq!(storage.get(USER_KEY), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let store = SessionStore::new(LocalStorage::new());
        store.write(&session()).unwrap();

        store.clear();
        store.clear();
        assert_eq!(store.read(), None);
    }

    #[test]
    fn quota_rejection_leaves_nothing_behind() {
        let storage = LocalStorage::with_quota(32);
        let store = SessionStore::new(storage.clone());

        let err = store.write(&session()).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::QuotaExceeded | PersistenceError::Disabled
        ));
        assert_eq!(storage.get(TOKEN_KEY), None);
        assert_eq!(storage.get(USER_KEY), None);
    }

    #[test]
    fn disabled_storage_rejects_writes() {
        let store = SessionStore::new(LocalStorage::disabled());
        assert_eq!(store.write(&session()), Err(PersistenceError::Disabled));
        assert_eq!(store.read(), None);
    }

    #[test]
    fn clones_share_the_origin_storage() {
        let storage = LocalStorage::new();
        let context_a = SessionStore::new(storage.clone());
        let context_b = SessionStore::new(storage);

        let session = session();
        context_a.write(&session).unwrap();
        assert_eq!(context_b.read(), Some(session));
    }
}
