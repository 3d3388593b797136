//! Usage: Public test helpers for integration tests.

use crate::client::errors::ErrorNotice;
use crate::client::hooks::ClientHooks;
use crate::infra::settings::ClientSettings;
use crate::shared::mutex_ext::MutexExt;
use crate::telemetry::{AnalyticsSink, GtagCommand};
use std::sync::Mutex;

/// Records notices and login redirects instead of touching a UI.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    notices: Mutex<Vec<(ErrorNotice, u16)>>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn notices(&self) -> Vec<(ErrorNotice, u16)> {
        self.notices.lock_or_recover().clone()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock_or_recover().clone()
    }
}

impl ClientHooks for RecordingHooks {
    fn notify(&self, notice: ErrorNotice, status: u16) {
        self.notices.lock_or_recover().push((notice, status));
    }

    fn redirect_to_login(&self, login_path: &str) {
        self.redirects.lock_or_recover().push(login_path.to_string());
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Mutex<Vec<GtagCommand>>,
}

impl RecordingSink {
    pub fn commands(&self) -> Vec<GtagCommand> {
        self.commands.lock_or_recover().clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                GtagCommand::Event { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl AnalyticsSink for RecordingSink {
    fn send(&self, command: GtagCommand) {
        self.commands.lock_or_recover().push(command);
    }
}

/// Settings pointing at a mock API; everything else stays default.
pub fn settings_for(api_base: &str) -> ClientSettings {
    ClientSettings {
        api_base: api_base.to_string(),
        ..ClientSettings::default()
    }
}
