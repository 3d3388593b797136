//! Usage: Store listing endpoints.

use crate::client::errors::ApiResult;
use crate::client::{ApiClient, ApiRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const STORES_PATH: &str = "/stores";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Store {
    pub id: i64,
    pub slug: String,
    pub user_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub rating: f64,
    pub description: String,
    pub address: String,
    pub contacts: String,
    pub working_hours: String,
    pub price: String,
    pub latitude: String,
    pub longitude: String,
    pub thumbnail_url: String,
    pub created_at: String,
    pub updated_at: String,
    /// Panorama and other presentation fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct StoresEnvelope {
    #[serde(default)]
    stores: Vec<Store>,
}

pub struct StoresApi<'a> {
    client: &'a ApiClient,
}

impl<'a> StoresApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `query` pairs are sent as-is in the query string.
    pub async fn get_stores(&self, query: &[(&str, &str)]) -> ApiResult<Vec<Store>> {
        let request = query
            .iter()
            .fold(ApiRequest::get(STORES_PATH), |req, (k, v)| req.query(*k, *v));
        let envelope: StoresEnvelope = self.client.get_json(request).await?;
        Ok(envelope.stores)
    }

    pub async fn get_store_by_id(&self, id: i64) -> ApiResult<Option<Store>> {
        let id = id.to_string();
        Ok(self.get_stores(&[("id", id.as_str())]).await?.into_iter().next())
    }

    pub async fn get_store_by_slug(&self, slug: &str) -> ApiResult<Option<Store>> {
        Ok(self.get_stores(&[("slug", slug)]).await?.into_iter().next())
    }
}
