//! Usage: Business listing CRUD endpoints.

use crate::client::errors::{ApiError, ApiResult};
use crate::client::{ApiClient, ApiRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const BUSINESS_PATH: &str = "/business";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Business {
    pub id: i64,
    pub slug: String,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub address: String,
    pub contacts: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

pub struct BusinessApi<'a> {
    client: &'a ApiClient,
}

impl<'a> BusinessApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> ApiResult<Vec<Business>> {
        self.client.get_json(ApiRequest::get(BUSINESS_PATH)).await
    }

    pub async fn get_by_slug(&self, slug: &str) -> ApiResult<Option<Business>> {
        let found: Vec<Business> = self
            .client
            .get_json(ApiRequest::get(BUSINESS_PATH).query("slug", slug))
            .await?;
        Ok(found.into_iter().next())
    }

    /// Returns the API's response body as-is.
    pub async fn create(&self, payload: &Business) -> ApiResult<Value> {
        let request = ApiRequest::post(format!("{BUSINESS_PATH}/create")).json(to_body(payload)?);
        self.send_for_value(request).await
    }

    pub async fn update(&self, payload: &Business) -> ApiResult<Value> {
        let request = ApiRequest::put(format!("{BUSINESS_PATH}/")).json(to_body(payload)?);
        self.send_for_value(request).await
    }

    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        let request = ApiRequest::delete(BUSINESS_PATH).query("id", id.to_string());
        self.client.send(request).await
    }

    async fn send_for_value(&self, request: ApiRequest) -> ApiResult<Value> {
        let body = self.client.execute(request).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn to_body(payload: &Business) -> ApiResult<Value> {
    serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
}
