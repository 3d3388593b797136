//! LocalHub API client core: durable auth session, single-flight token refresh, consent store,
//! and consent-gated telemetry.

pub mod api;
pub mod app;
pub mod client;
pub mod domain;
pub mod infra;
mod shared;
pub mod telemetry;
pub mod test_support;

pub use app::app_state::{AppDeps, AppState, ConsentBackend};
pub use client::errors::{ApiError, ApiErrorCode, ApiResult, ErrorNotice};
pub use client::{ApiClient, ApiRequest};
pub use shared::error::{AppError, AppResult};
