//! Usage: Auth endpoints (sign-in, sign-up, current user, logout).

use crate::client::errors::{ApiError, ApiResult};
use crate::client::{ApiClient, ApiRequest};
use crate::domain::session::{Session, SessionPatch, TokenPatch, UserPatch, UserProfile};
use crate::infra::settings::AuthSettings;
use serde::{Deserialize, Serialize};
use serde_json::json;

const REGISTRATION_PATH: &str = "/auth/registration";
const CURRENT_USER_PATH: &str = "/auth/user";

#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// `{ user, tokens }` as returned by login and registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: UserPatch,
    pub tokens: TokenPatch,
}

/// `/auth/user` answers with the `{ user, tokens }` envelope; a bare profile is accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CurrentUserBody {
    Envelope { user: UserPatch },
    Profile(UserPatch),
}

impl CurrentUserBody {
    fn into_patch(self) -> UserPatch {
        match self {
            Self::Envelope { user } | Self::Profile(user) => user,
        }
    }
}

pub struct AuthApi<'a> {
    client: &'a ApiClient,
    paths: &'a AuthSettings,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient, paths: &'a AuthSettings) -> Self {
        Self { client, paths }
    }

    /// Credentials failures are not token failures, so login never triggers a refresh.
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<Session> {
        let request = ApiRequest::post(self.paths.login_path.as_str())
            .json(json!({ "email": email, "password": password }))
            .no_refresh();
        let response: AuthResponse = self.client.get_json(request).await?;
        self.store(response)
    }

    pub async fn sign_up(&self, payload: &SignUpRequest) -> ApiResult<Session> {
        let body = serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))?;
        let request = ApiRequest::post(REGISTRATION_PATH).json(body).no_refresh();
        let response: AuthResponse = self.client.get_json(request).await?;
        self.store(response)
    }

    /// Fetches the profile, merges it into the session and returns the merged profile.
    pub async fn current_user(&self) -> ApiResult<UserProfile> {
        if !self.client.session().is_authenticated() {
            return Err(ApiError::NotAuthenticated);
        }
        let body: CurrentUserBody = self
            .client
            .get_json(ApiRequest::get(CURRENT_USER_PATH))
            .await?;
        let user = body.into_patch();
        if user.id.unwrap_or(0) == 0 {
            return Err(ApiError::Decode("current user response has no user id".into()));
        }
        Ok(self.client.session().save(SessionPatch::user(user)).user)
    }

    /// Best-effort remote logout, then the local session is cleared unconditionally.
    pub async fn logout(&self) {
        let request = ApiRequest::post(self.paths.logout_path.as_str()).no_refresh();
        self.client
            .session()
            .logout(|| self.client.send(request))
            .await;
        self.client.forget_authorization();
    }

    fn store(&self, response: AuthResponse) -> ApiResult<Session> {
        let access = response
            .tokens
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::Decode("auth response missing tokens.accessToken".into()))?;

        let session = self.client.session().save(SessionPatch {
            user: Some(response.user),
            tokens: Some(response.tokens),
        });
        self.client.set_default_authorization(Some(access));
        tracing::info!(user_id = session.user.id, "signed in");
        Ok(session)
    }
}
