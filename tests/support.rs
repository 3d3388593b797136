#![allow(dead_code)]

use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use localhub_client::api::Api;
use localhub_client::domain::session::{SessionPatch, SessionStore, TokenPatch};
use localhub_client::infra::settings::ClientSettings;
use localhub_client::infra::storage::{DurableStorage, MemoryStorage};
use localhub_client::test_support::{settings_for, RecordingHooks};
use localhub_client::ApiClient;
use wiremock::MockServer;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn save_once(&mut self, key: &'static str) {
        if self.saved.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.saved.push((key, std::env::var_os(key)));
    }

    pub fn set_var(&mut self, key: &'static str, value: impl Into<OsString>) {
        self.save_once(key);
        std::env::set_var(key, value.into());
    }

    pub fn remove_var(&mut self, key: &'static str) {
        self.save_once(key);
        std::env::remove_var(key);
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// A client wired to a fresh mock API, with an in-memory session store.
pub struct TestClient {
    pub server: MockServer,
    pub settings: ClientSettings,
    pub hooks: Arc<RecordingHooks>,
    pub storage: Arc<MemoryStorage>,
    pub session: Arc<SessionStore>,
    pub client: Arc<ApiClient>,
}

impl TestClient {
    pub async fn start() -> Self {
        Self::start_with_tokens(None, None).await
    }

    /// Seeds the session before the client is built, as a reload with a persisted session would.
    pub async fn start_with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        let server = MockServer::start().await;
        let settings = settings_for(&server.uri());
        let storage = Arc::new(MemoryStorage::new());
        let durable: Arc<dyn DurableStorage> = storage.clone();
        let session = Arc::new(SessionStore::new(durable));
        if access.is_some() || refresh.is_some() {
            session.save(SessionPatch::tokens(TokenPatch {
                access_token: access.map(str::to_string),
                refresh_token: refresh.map(str::to_string),
                ..TokenPatch::default()
            }));
        }

        let hooks = Arc::new(RecordingHooks::default());
        let client = Arc::new(
            ApiClient::new(&settings, session.clone(), hooks.clone()).expect("build client"),
        );

        Self {
            server,
            settings,
            hooks,
            storage,
            session,
            client,
        }
    }

    pub fn api(&self) -> Api {
        Api::new(self.client.clone(), self.settings.auth.clone())
    }

    /// Requests the mock server received for `path`, in arrival order.
    pub async fn requests_to(&self, path: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == path)
            .collect()
    }
}

pub fn authorization(request: &wiremock::Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
