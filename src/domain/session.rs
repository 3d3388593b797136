//! Usage: Auth session store (current user + tokens, persisted to durable client storage).

use crate::infra::storage::DurableStorage;
use crate::shared::mutex_ext::MutexExt;
use crate::shared::security::mask_token;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};

pub const SESSION_STORAGE_KEY: &str = "userData";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: i64,
    pub email: Option<String>,
    pub name: String,
    pub surname: String,
    pub phone: String,
    pub picture: String,
    pub role: String,
    pub social_login: bool,
    pub isactivated: bool,
    pub facebook_id: Option<String>,
    pub google_id: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    /// Fields the API sends that this client does not model; kept so they survive a save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Field-wise profile update; absent fields keep their value and `extra` merges key by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_login: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isactivated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl UserPatch {
    fn apply_to(self, user: &mut UserProfile) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut user.id, self.id);
        if self.email.is_some() {
            user.email = self.email;
        }
        set(&mut user.name, self.name);
        set(&mut user.surname, self.surname);
        set(&mut user.phone, self.phone);
        set(&mut user.picture, self.picture);
        set(&mut user.role, self.role);
        set(&mut user.social_login, self.social_login);
        set(&mut user.isactivated, self.isactivated);
        if self.facebook_id.is_some() {
            user.facebook_id = self.facebook_id;
        }
        if self.google_id.is_some() {
            user.google_id = self.google_id;
        }
        set(&mut user.created_at, self.created_at);
        if self.updated_at.is_some() {
            user.updated_at = self.updated_at;
        }
        user.extra.extend(self.extra);
    }
}

impl From<UserProfile> for UserPatch {
    fn from(user: UserProfile) -> Self {
        Self {
            id: Some(user.id),
            email: user.email,
            name: Some(user.name),
            surname: Some(user.surname),
            phone: Some(user.phone),
            picture: Some(user.picture),
            role: Some(user.role),
            social_login: Some(user.social_login),
            isactivated: Some(user.isactivated),
            facebook_id: user.facebook_id,
            google_id: user.google_id,
            created_at: Some(user.created_at),
            updated_at: user.updated_at,
            extra: user.extra,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    #[serde(default)]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(
        rename = "expAcToken",
        default,
        deserialize_with = "de_unix_lossy",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_expiry: Option<i64>,
    #[serde(
        rename = "expRfToken",
        default,
        deserialize_with = "de_unix_lossy",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_expiry: Option<i64>,
}

/// Field-wise token update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(
        rename = "expAcToken",
        default,
        deserialize_with = "de_unix_lossy",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_expiry: Option<i64>,
    #[serde(
        rename = "expRfToken",
        default,
        deserialize_with = "de_unix_lossy",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_expiry: Option<i64>,
}

impl TokenPatch {
    pub fn access(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            ..Self::default()
        }
    }

    fn apply_to(&self, tokens: &mut TokenSet) {
        if let Some(access) = &self.access_token {
            tokens.access_token = access.clone();
        }
        if let Some(refresh) = self.refresh_token.as_deref().filter(|v| !v.is_empty()) {
            tokens.refresh_token = Some(refresh.to_string());
        }
        if self.access_expiry.is_some() {
            tokens.access_expiry = self.access_expiry;
        }
        if self.refresh_expiry.is_some() {
            tokens.refresh_expiry = self.refresh_expiry;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub user: UserProfile,
    #[serde(default)]
    pub tokens: TokenSet,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        !self.tokens.access_token.is_empty()
    }
}

/// Partial session update. Both `user` and `tokens` merge field-by-field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenPatch>,
}

impl SessionPatch {
    pub fn tokens(tokens: TokenPatch) -> Self {
        Self {
            user: None,
            tokens: Some(tokens),
        }
    }

    pub fn user(user: impl Into<UserPatch>) -> Self {
        Self {
            user: Some(user.into()),
            tokens: None,
        }
    }
}

// Expiry values arrive as numbers or numeric strings depending on the endpoint.
fn de_unix_lossy<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

#[derive(Debug)]
pub struct SessionStore {
    storage: Arc<dyn DurableStorage>,
    current: Mutex<Option<Session>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self {
            storage,
            current: Mutex::new(None),
        }
    }

    /// Merges `patch` into the current session (creating an empty one first) and persists it.
    pub fn save(&self, patch: SessionPatch) -> Session {
        let merged = {
            let mut guard = self.current.lock_or_recover();
            let session = guard.get_or_insert_with(Session::default);
            if let Some(user) = patch.user {
                user.apply_to(&mut session.user);
            }
            if let Some(tokens) = &patch.tokens {
                tokens.apply_to(&mut session.tokens);
            }
            session.clone()
        };

        self.persist(&merged);
        merged
    }

    /// Applies tokens from a refresh that was sent with `sent_refresh_token`.
    ///
    /// Returns `None` (and changes nothing) when the session was cleared or replaced while the
    /// refresh was in flight.
    pub fn apply_refresh(&self, sent_refresh_token: &str, tokens: &TokenPatch) -> Option<Session> {
        let updated = {
            let mut guard = self.current.lock_or_recover();
            let session = guard.as_mut()?;
            if session.tokens.refresh_token.as_deref() != Some(sent_refresh_token) {
                return None;
            }
            tokens.apply_to(&mut session.tokens);
            session.clone()
        };

        self.persist(&updated);
        Some(updated)
    }

    /// Reads the persisted session. Missing or unparseable state yields `None`.
    pub fn load(&self) -> Option<Session> {
        let loaded = match self.storage.get(SESSION_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(err) => {
                    tracing::warn!("persisted session is corrupt; treating as logged out: {err}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("failed to read persisted session: {err}");
                None
            }
        };

        *self.current.lock_or_recover() = loaded.clone();
        if let Some(session) = &loaded {
            tracing::debug!(
                authenticated = session.is_authenticated(),
                access_token = %mask_token(&session.tokens.access_token),
                "session loaded"
            );
        }
        loaded
    }

    pub fn current(&self) -> Option<Session> {
        self.current.lock_or_recover().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .lock_or_recover()
            .as_ref()
            .is_some_and(Session::is_authenticated)
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .lock_or_recover()
            .as_ref()
            .map(|s| s.tokens.access_token.clone())
            .filter(|v| !v.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current
            .lock_or_recover()
            .as_ref()
            .and_then(|s| s.tokens.refresh_token.clone())
            .filter(|v| !v.trim().is_empty())
    }

    /// True when the access token carries an expiry at or before `now_unix`.
    pub fn access_token_expired(&self, now_unix: i64) -> bool {
        self.current
            .lock_or_recover()
            .as_ref()
            .and_then(|s| s.tokens.access_expiry)
            .is_some_and(|expiry| expiry <= now_unix)
    }

    /// Drops the in-memory and persisted session without contacting the API.
    pub fn clear(&self) {
        *self.current.lock_or_recover() = None;
        if let Err(err) = self.storage.remove(SESSION_STORAGE_KEY) {
            tracing::warn!("failed to remove persisted session: {err}");
        }
    }

    /// Best-effort remote logout followed by an unconditional local clear.
    pub async fn logout<F, Fut, T, E>(&self, remote_logout: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if let Err(err) = remote_logout().await {
            tracing::warn!("remote logout failed; clearing local session anyway: {err}");
        }
        self.clear();
        tracing::info!("session cleared after logout");
    }

    fn persist(&self, session: &Session) {
        let encoded = match serde_json::to_string(session) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!("failed to serialize session: {err}");
                return;
            }
        };
        if let Err(err) = self.storage.set(SESSION_STORAGE_KEY, &encoded) {
            tracing::warn!("failed to persist session: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::storage::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, SessionStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        (storage, store)
    }

    #[test]
    fn save_initializes_missing_session_and_persists() {
        let (storage, store) = store();
        assert!(!store.is_authenticated());

        let session = store.save(SessionPatch::tokens(TokenPatch::access("A")));
        assert_eq!(session.tokens.access_token, "A");
        assert_eq!(session.user, UserProfile::default());
        assert!(store.is_authenticated());

        let raw = storage
            .get(SESSION_STORAGE_KEY)
            .expect("get")
            .expect("persisted");
        assert!(raw.contains(r#""accessToken":"A""#));
    }

    #[test]
    fn save_is_idempotent_for_same_payload() {
        let (_, once) = store();
        once.save(SessionPatch::tokens(TokenPatch::access("A")));

        let (_, twice) = store();
        twice.save(SessionPatch::tokens(TokenPatch::access("A")));
        twice.save(SessionPatch::tokens(TokenPatch::access("A")));

        assert_eq!(once.current(), twice.current());
    }

    #[test]
    fn token_patch_keeps_refresh_token_when_absent() {
        let (_, store) = store();
        store.save(SessionPatch::tokens(TokenPatch {
            access_token: Some("old".to_string()),
            refresh_token: Some("r1".to_string()),
            ..TokenPatch::default()
        }));

        let session = store.save(SessionPatch::tokens(TokenPatch::access("new1")));
        assert_eq!(session.tokens.access_token, "new1");
        assert_eq!(session.tokens.refresh_token.as_deref(), Some("r1"));
    }

    #[test]
    fn user_patch_merges_into_profile_and_keeps_tokens() {
        let (_, store) = store();
        store.save(SessionPatch::tokens(TokenPatch::access("A")));
        let first: SessionPatch =
            serde_json::from_str(r#"{"user":{"id":7,"name":"Olena","plan":"pro"}}"#)
                .expect("patch");
        store.save(first);

        let second: SessionPatch =
            serde_json::from_str(r#"{"user":{"phone":"123","locale":"uk"}}"#).expect("patch");
        let session = store.save(second);

        assert_eq!(session.user.id, 7);
        assert_eq!(session.user.name, "Olena");
        assert_eq!(session.user.phone, "123");
        assert_eq!(session.user.extra.get("plan"), Some(&Value::from("pro")));
        assert_eq!(session.user.extra.get("locale"), Some(&Value::from("uk")));
        assert_eq!(session.tokens.access_token, "A");
    }

    #[test]
    fn refresh_tokens_apply_only_to_the_session_that_sent_them() {
        let (storage, store) = store();
        assert_eq!(store.apply_refresh("r1", &TokenPatch::access("new1")), None);
        assert_eq!(store.current(), None);
        assert_eq!(storage.get(SESSION_STORAGE_KEY).expect("get"), None);

        store.save(SessionPatch::tokens(TokenPatch {
            access_token: Some("old".to_string()),
            refresh_token: Some("r2".to_string()),
            ..TokenPatch::default()
        }));
        assert_eq!(store.apply_refresh("r1", &TokenPatch::access("new1")), None);
        assert_eq!(store.access_token().as_deref(), Some("old"));

        let session = store
            .apply_refresh("r2", &TokenPatch::access("new2"))
            .expect("applied");
        assert_eq!(session.tokens.access_token, "new2");
        assert_eq!(session.tokens.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn load_reads_persisted_session_and_sets_authenticated() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(
                SESSION_STORAGE_KEY,
                r#"{"user":{"id":3,"name":"Taras","surname":"K","unknown_field":true},"tokens":{"accessToken":"tok","refreshToken":"r1","expAcToken":"1700000000"}}"#,
            )
            .expect("seed");

        let store = SessionStore::new(storage);
        let session = store.load().expect("session");
        assert!(store.is_authenticated());
        assert_eq!(session.user.id, 3);
        assert_eq!(session.user.extra.get("unknown_field"), Some(&Value::Bool(true)));
        assert_eq!(session.tokens.access_expiry, Some(1_700_000_000));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
        assert!(store.access_token_expired(1_700_000_001));
        assert!(!store.access_token_expired(1_600_000_000));
    }

    #[test]
    fn load_treats_empty_access_token_as_unauthenticated() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(SESSION_STORAGE_KEY, r#"{"tokens":{"accessToken":""}}"#)
            .expect("seed");
        let store = SessionStore::new(storage);
        assert!(store.load().is_some());
        assert!(!store.is_authenticated());
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn load_corrupt_session_returns_none() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(SESSION_STORAGE_KEY, "{not json")
            .expect("seed");
        let store = SessionStore::new(storage);
        assert_eq!(store.load(), None);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_state_even_when_remote_fails() {
        let (storage, store) = store();
        store.save(SessionPatch::tokens(TokenPatch {
            access_token: Some("A".to_string()),
            refresh_token: Some("r1".to_string()),
            ..TokenPatch::default()
        }));

        store
            .logout(|| async { Err::<(), _>("NETWORK_ERROR: offline".to_string()) })
            .await;

        assert_eq!(store.load(), None);
        assert!(!store.is_authenticated());
        assert_eq!(storage.get(SESSION_STORAGE_KEY).expect("get"), None);
    }
}
