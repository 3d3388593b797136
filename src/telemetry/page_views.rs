//! Usage: Automatic page-view tracking on route changes.

use super::TelemetryGate;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    /// Path plus query string and fragment.
    pub full_path: String,
    pub title: Option<String>,
}

impl Route {
    pub fn new(full_path: impl Into<String>) -> Self {
        let full_path = full_path.into();
        let path = full_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            path,
            full_path,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug)]
pub struct PageViewTracker {
    gate: Arc<TelemetryGate>,
    default_title: String,
}

impl PageViewTracker {
    pub fn new(gate: Arc<TelemetryGate>, default_title: impl Into<String>) -> Self {
        Self {
            gate,
            default_title: default_title.into(),
        }
    }

    /// Schedules a page view for `to` after the current task yields; query-only changes are
    /// ignored. The handle resolves to whether the page view was sent.
    pub fn on_route_change(&self, from: &Route, to: &Route) -> Option<JoinHandle<bool>> {
        if from.path == to.path {
            tracing::trace!(path = %to.path, "route path unchanged; page view skipped");
            return None;
        }

        let gate = self.gate.clone();
        let title = to
            .title
            .clone()
            .unwrap_or_else(|| self.default_title.clone());
        let full_path = to.full_path.clone();
        Some(tokio::spawn(async move {
            tokio::task::yield_now().await;
            gate.track_page_view(Some(&title), &full_path)
        }))
    }
}
