//! Usage: Per-resource request builders over [`ApiClient`] (auth, stores, business).

pub mod auth;
pub mod business;
pub mod stores;

use crate::client::ApiClient;
use crate::infra::settings::AuthSettings;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Api {
    client: Arc<ApiClient>,
    auth_paths: AuthSettings,
}

impl Api {
    pub fn new(client: Arc<ApiClient>, auth_paths: AuthSettings) -> Self {
        Self { client, auth_paths }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn auth(&self) -> auth::AuthApi<'_> {
        auth::AuthApi::new(&self.client, &self.auth_paths)
    }

    pub fn stores(&self) -> stores::StoresApi<'_> {
        stores::StoresApi::new(&self.client)
    }

    pub fn business(&self) -> business::BusinessApi<'_> {
        business::BusinessApi::new(&self.client)
    }
}
