//! Usage: Authenticated HTTP client for the LocalHub API.
//!
//! Every request carries the session's access token. A 401/403 on a request that has not been
//! retried yet runs the single-flight refresh (see [`refresh`]) and replays the request once with
//! the new token; a failed refresh clears the session and asks the UI to go to the login page.

pub mod errors;
pub mod hooks;
pub mod refresh;

use crate::domain::session::{SessionStore, TokenPatch};
use crate::infra::settings::ClientSettings;
use crate::shared::error::AppResult;
use crate::shared::mutex_ext::MutexExt;
use crate::shared::security::mask_token;
use errors::{ApiError, ApiResult};
use hooks::ClientHooks;
use refresh::{RefreshCoordinator, RefreshOutcome};
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Opts out of refresh-and-retry (used for logout).
    pub fn no_refresh(mut self) -> Self {
        self.retried = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    tokens: TokenPatch,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    refresh_path: String,
    login_path: String,
    session: Arc<SessionStore>,
    default_authorization: Mutex<Option<String>>,
    refresh: RefreshCoordinator,
    hooks: Arc<dyn ClientHooks>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("refresh_path", &self.refresh_path)
            .field("login_path", &self.login_path)
            .field("refresh", &self.refresh.status())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        settings: &ClientSettings,
        session: Arc<SessionStore>,
        hooks: Arc<dyn ClientHooks>,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|e| format!("HTTP_CLIENT_INIT: failed to build http client: {e}"))?;

        let client = Self {
            http,
            base_url: settings.api_base.trim_end_matches('/').to_string(),
            refresh_path: settings.auth.refresh_path.clone(),
            login_path: settings.login_path.clone(),
            default_authorization: Mutex::new(None),
            refresh: RefreshCoordinator::new(),
            hooks,
            session,
        };
        client.set_default_authorization(client.session.access_token());
        Ok(client)
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Token applied to requests made while no session token is present.
    pub fn default_authorization(&self) -> Option<String> {
        self.default_authorization.lock_or_recover().clone()
    }

    pub(crate) fn set_default_authorization(&self, token: Option<String>) {
        *self.default_authorization.lock_or_recover() = token.filter(|v| !v.trim().is_empty());
    }

    pub async fn get_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn send(&self, request: ApiRequest) -> ApiResult<()> {
        self.execute(request).await.map(|_| ())
    }

    /// Sends `request`, refreshing and replaying it at most once on 401/403.
    pub async fn execute(&self, mut request: ApiRequest) -> ApiResult<String> {
        let token = self.current_authorization();
        let err = match self.send_once(&request, token.as_deref()).await {
            Ok(body) => return Ok(body),
            Err(err) => err,
        };

        if !err.is_auth_failure() || request.retried {
            self.report(&request, &err);
            return Err(err);
        }

        request.retried = true;
        let replay_token = match self.refresh_after_failure(token.as_deref()).await {
            RefreshOutcome::Refreshed(token) => token,
            RefreshOutcome::Failed => {
                self.report(&request, &err);
                return Err(err);
            }
        };

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            "replaying request with refreshed token"
        );
        let replayed = self.send_once(&request, Some(&replay_token)).await;
        if let Err(err) = &replayed {
            self.report(&request, err);
        }
        replayed
    }

    fn current_authorization(&self) -> Option<String> {
        self.session
            .access_token()
            .or_else(|| self.default_authorization())
    }

    async fn send_once(&self, request: &ApiRequest, bearer: Option<&str>) -> ApiResult<String> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path))
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::status(status.as_u16(), body))
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn report(&self, request: &ApiRequest, err: &ApiError) {
        tracing::warn!(
            method = %request.method,
            path = %request.path,
            status = err.status_code(),
            code = err.code().as_str(),
            "api request failed: {err}"
        );
        if let (Some(notice), Some(status)) = (err.notice(), err.status_code()) {
            self.hooks.notify(notice, status);
        }
    }

    async fn refresh_after_failure(&self, failed_token: Option<&str>) -> RefreshOutcome {
        // A refresh that settled after this request went out already produced a newer token.
        if let Some(current) = self.session.access_token() {
            if failed_token != Some(current.as_str()) {
                return RefreshOutcome::Refreshed(current);
            }
        }
        self.refresh.run(|| self.refresh_session()).await
    }

    async fn refresh_session(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.session.refresh_token() else {
            tracing::warn!("refresh token missing; ending session");
            self.end_session();
            return RefreshOutcome::Failed;
        };

        match self.request_refresh(&refresh_token).await {
            Ok(tokens) => {
                let Some(session) = self.session.apply_refresh(&refresh_token, &tokens) else {
                    tracing::info!("session changed while refreshing; discarding refreshed tokens");
                    return RefreshOutcome::Failed;
                };
                let access = session.tokens.access_token;
                self.set_default_authorization(Some(access.clone()));
                tracing::info!(access_token = %mask_token(&access), "access token refreshed");
                RefreshOutcome::Refreshed(access)
            }
            Err(err) => {
                tracing::warn!(code = err.code().as_str(), "token refresh failed: {err}");
                self.end_session();
                RefreshOutcome::Failed
            }
        }
    }

    /// Calls the refresh endpoint without an `Authorization` header.
    async fn request_refresh(&self, refresh_token: &str) -> ApiResult<TokenPatch> {
        let request = ApiRequest::post(self.refresh_path.as_str())
            .json(json!({ "refreshToken": refresh_token }))
            .no_refresh();
        let body = self.send_once(&request, None).await?;
        let parsed: RefreshResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        let has_access = parsed
            .tokens
            .access_token
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty());
        if !has_access {
            return Err(ApiError::Decode(
                "refresh response missing tokens.accessToken".to_string(),
            ));
        }
        Ok(parsed.tokens)
    }

    /// Drops the local session and default header, then redirects to login. No remote logout.
    fn end_session(&self) {
        self.session.clear();
        self.set_default_authorization(None);
        self.hooks.redirect_to_login(&self.login_path);
    }

    /// Clears the default header after an explicit logout.
    pub(crate) fn forget_authorization(&self) {
        self.set_default_authorization(None);
    }
}
