//! Usage: UI-side effects the HTTP client triggers (toasts and the login redirect).

use super::errors::ErrorNotice;

pub trait ClientHooks: Send + Sync {
    /// A request failed with a status that has a user-facing notice.
    fn notify(&self, notice: ErrorNotice, status: u16) {
        tracing::info!(status, key = notice.message_key(), "api error notice");
    }

    /// The session is gone after a failed refresh.
    fn redirect_to_login(&self, login_path: &str) {
        tracing::info!(login_path, "redirect to login requested");
    }
}

/// Hooks that only log.
#[derive(Debug, Default)]
pub struct LogOnlyHooks;

impl ClientHooks for LogOnlyHooks {}
