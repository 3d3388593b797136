//! Usage: Consent-gated analytics dispatch (gtag-style commands, fire-or-drop).
//!
//! Every tracking call checks the `analytics` consent category at call time. Nothing is queued:
//! a call made without consent is dropped, and granting consent later does not replay it.

pub mod events;
pub mod page_views;

use crate::domain::consent::record::{ConsentCategory, ConsentRecord};
use crate::domain::consent::{ConsentListener, ConsentStore};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Cookies set by the analytics SDK; erased whenever analytics consent is missing.
pub const ANALYTICS_COOKIES: [&str; 4] = ["_ga", "_gid", "_gat", "_gat_gtag"];

#[derive(Debug, Clone, PartialEq)]
pub enum GtagCommand {
    Event { name: String, params: Map<String, Value> },
    Config { target: String, params: Map<String, Value> },
    /// `gtag('consent', 'update', params)`
    Consent { params: Map<String, Value> },
}

/// Third-party analytics SDK seam.
pub trait AnalyticsSink: Send + Sync {
    fn send(&self, command: GtagCommand);
}

/// Sink for headless runs: commands only show up in the log.
#[derive(Debug, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn send(&self, command: GtagCommand) {
        tracing::debug!(?command, "analytics command");
    }
}

/// Drops `null` values the way gtag ignores `undefined` parameters.
pub(crate) fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Map::new(),
    }
}

pub struct TelemetryGate {
    consent: Arc<ConsentStore>,
    sink: Arc<dyn AnalyticsSink>,
    measurement_id: String,
    default_currency: String,
}

impl std::fmt::Debug for TelemetryGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGate")
            .field("measurement_id", &self.measurement_id)
            .field("default_currency", &self.default_currency)
            .finish()
    }
}

impl TelemetryGate {
    pub fn new(
        consent: Arc<ConsentStore>,
        sink: Arc<dyn AnalyticsSink>,
        measurement_id: impl Into<String>,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            consent,
            sink,
            measurement_id: measurement_id.into(),
            default_currency: default_currency.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.consent.is_analytics_accepted()
    }

    /// Returns whether the command reached the sink.
    fn dispatch(&self, call: &'static str, command: GtagCommand) -> bool {
        if !self.consent.accepted(ConsentCategory::Analytics) {
            tracing::debug!(call, "analytics consent not granted; call dropped");
            return false;
        }
        self.sink.send(command);
        true
    }

    pub fn track_event(&self, name: &str, parameters: Value) -> bool {
        self.dispatch(
            "track_event",
            GtagCommand::Event {
                name: name.to_string(),
                params: params(parameters),
            },
        )
    }

    pub fn track_page_view(&self, title: Option<&str>, path: &str) -> bool {
        self.dispatch(
            "track_page_view",
            GtagCommand::Config {
                target: self.measurement_id.clone(),
                params: params(json!({
                    "page_title": title,
                    "page_location": path,
                    "page_path": path,
                })),
            },
        )
    }

    pub fn track_conversion(
        &self,
        conversion_id: &str,
        value: Option<f64>,
        currency: Option<&str>,
    ) -> bool {
        let currency = currency
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.default_currency);
        self.dispatch(
            "track_conversion",
            GtagCommand::Event {
                name: "conversion".to_string(),
                params: params(json!({
                    "send_to": conversion_id,
                    "value": value,
                    "currency": currency,
                })),
            },
        )
    }

    pub fn set_user_properties(&self, properties: Map<String, Value>) -> bool {
        let mut params = Map::new();
        params.insert("custom_map".to_string(), Value::Object(properties));
        self.dispatch(
            "set_user_properties",
            GtagCommand::Config {
                target: self.measurement_id.clone(),
                params,
            },
        )
    }
}

/// Pushes gtag consent updates and clears analytics cookies when consent is missing.
pub struct AnalyticsConsentListener {
    sink: Arc<dyn AnalyticsSink>,
}

impl AnalyticsConsentListener {
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self { sink }
    }
}

impl ConsentListener for AnalyticsConsentListener {
    fn on_consent_change(&self, store: &ConsentStore, record: &ConsentRecord, _first: bool) {
        if record.contains(ConsentCategory::Analytics) {
            self.sink.send(GtagCommand::Consent {
                params: params(json!({ "analytics_storage": "granted" })),
            });
            tracing::info!("analytics enabled");
            return;
        }

        self.sink.send(GtagCommand::Consent {
            params: params(json!({
                "analytics_storage": "denied",
                "ad_storage": "denied",
            })),
        });
        let path = store.cookie_path().to_string();
        store.erase_cookies(&ANALYTICS_COOKIES, &path, None);
        if let Some(domain) = store.cookie_domain().map(str::to_string) {
            store.erase_cookies(&ANALYTICS_COOKIES, &path, Some(&domain));
        }
        tracing::info!("analytics disabled and analytics cookies cleared");
    }
}
