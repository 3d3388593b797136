//! Usage: Client settings (schema + TOML read/write helpers + env overrides).

use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 2;
pub const DEFAULT_API_BASE: &str = "http://localhost:5050";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
const MIN_REQUEST_TIMEOUT_MS: u64 = 1_000;
const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_AUTH_LOGIN_PATH: &str = "/auth/login";
const DEFAULT_AUTH_REFRESH_PATH: &str = "/auth/refresh";
const DEFAULT_AUTH_LOGOUT_PATH: &str = "/auth/logout";
pub const DEFAULT_CONSENT_COOKIE_NAME: &str = "cc_cookie";
const DEFAULT_COOKIE_PATH: &str = "/";
const DEFAULT_CURRENCY: &str = "UAH";
pub const DEFAULT_LOG_FILTER: &str = "info";

const ENV_API_BASE: &str = "LOCALHUB_API_BASE";
const ENV_LOG_FILTER: &str = "LOCALHUB_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub login_path: String,
    pub refresh_path: String,
    pub logout_path: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_AUTH_LOGIN_PATH.to_string(),
            refresh_path: DEFAULT_AUTH_REFRESH_PATH.to_string(),
            logout_path: DEFAULT_AUTH_LOGOUT_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentSettings {
    pub cookie_name: String,
    // Bumping the revision invalidates every previously stored consent record.
    pub revision: u32,
    // When set, the consent cookie is HMAC-signed with this secret.
    pub cookie_secret: Option<String>,
    pub cookie_path: String,
    pub cookie_domain: Option<String>,
}

impl Default for ConsentSettings {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_CONSENT_COOKIE_NAME.to_string(),
            revision: 0,
            cookie_secret: None,
            cookie_path: DEFAULT_COOKIE_PATH.to_string(),
            cookie_domain: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub measurement_id: String,
    pub default_currency: String,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            measurement_id: String::new(),
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    // `None` keeps durable state in memory only.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub filter: String,
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub schema_version: u32,
    pub api_base: String,
    pub request_timeout_ms: u64,
    // Where the UI sends the user after the session is lost.
    pub login_path: String,
    pub auth: AuthSettings,
    pub consent: ConsentSettings,
    pub analytics: AnalyticsSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            auth: AuthSettings::default(),
            consent: ConsentSettings::default(),
            analytics: AnalyticsSettings::default(),
            storage: StorageSettings::default(),
            log: LogSettings::default(),
        }
    }
}

fn sanitize_path(value: &mut String, default: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        *value = default.to_string();
        return true;
    }
    if !trimmed.starts_with('/') {
        *value = format!("/{trimmed}");
        return true;
    }
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
        return true;
    }
    false
}

fn sanitize_settings(settings: &mut ClientSettings) -> bool {
    let mut changed = false;

    let api_base = settings.api_base.trim().trim_end_matches('/');
    if api_base.is_empty() {
        settings.api_base = DEFAULT_API_BASE.to_string();
        changed = true;
    } else if api_base.len() != settings.api_base.len() {
        settings.api_base = api_base.to_string();
        changed = true;
    }

    let timeout = settings
        .request_timeout_ms
        .clamp(MIN_REQUEST_TIMEOUT_MS, MAX_REQUEST_TIMEOUT_MS);
    if timeout != settings.request_timeout_ms {
        settings.request_timeout_ms = timeout;
        changed = true;
    }

    changed |= sanitize_path(&mut settings.login_path, DEFAULT_LOGIN_PATH);
    changed |= sanitize_path(&mut settings.auth.login_path, DEFAULT_AUTH_LOGIN_PATH);
    changed |= sanitize_path(&mut settings.auth.refresh_path, DEFAULT_AUTH_REFRESH_PATH);
    changed |= sanitize_path(&mut settings.auth.logout_path, DEFAULT_AUTH_LOGOUT_PATH);
    changed |= sanitize_path(&mut settings.consent.cookie_path, DEFAULT_COOKIE_PATH);

    if settings.consent.cookie_name.trim().is_empty() {
        settings.consent.cookie_name = DEFAULT_CONSENT_COOKIE_NAME.to_string();
        changed = true;
    }
    if settings
        .consent
        .cookie_secret
        .as_deref()
        .is_some_and(|v| v.trim().is_empty())
    {
        settings.consent.cookie_secret = None;
        changed = true;
    }
    if settings.analytics.default_currency.trim().is_empty() {
        settings.analytics.default_currency = DEFAULT_CURRENCY.to_string();
        changed = true;
    }
    if settings.log.filter.trim().is_empty() {
        settings.log.filter = DEFAULT_LOG_FILTER.to_string();
        changed = true;
    }

    if settings.schema_version != SCHEMA_VERSION {
        settings.schema_version = SCHEMA_VERSION;
        changed = true;
    }

    changed
}

fn apply_env_overrides(settings: &mut ClientSettings, mut get: impl FnMut(&str) -> Option<String>) {
    if let Some(api_base) = get(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
        settings.api_base = api_base;
    }
    if let Some(filter) = get(ENV_LOG_FILTER).filter(|v| !v.trim().is_empty()) {
        settings.log.filter = filter;
    }
}

pub fn parse(raw: &str) -> AppResult<ClientSettings> {
    let mut settings: ClientSettings = toml::from_str(raw)
        .map_err(|e| format!("CONFIG_INVALID: failed to parse settings toml: {e}"))?;
    if sanitize_settings(&mut settings) {
        tracing::debug!("client settings sanitized after parse");
    }
    Ok(settings)
}

/// Reads settings from `path`; a missing file yields defaults. Environment overrides apply last.
pub fn read(path: &Path) -> AppResult<ClientSettings> {
    let mut settings = match std::fs::read_to_string(path) {
        Ok(raw) => parse(&raw)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "settings file missing; using defaults");
            ClientSettings::default()
        }
        Err(err) => {
            return Err(format!(
                "SYSTEM_ERROR: failed to read settings {}: {err}",
                path.display()
            )
            .into())
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    sanitize_settings(&mut settings);
    Ok(settings)
}

pub fn write(path: &Path, settings: &ClientSettings) -> AppResult<ClientSettings> {
    let mut next = settings.clone();
    sanitize_settings(&mut next);

    let encoded = toml::to_string_pretty(&next)
        .map_err(|e| format!("SYSTEM_ERROR: failed to serialize settings: {e}"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            format!(
                "SYSTEM_ERROR: failed to create settings dir {}: {e}",
                parent.display()
            )
        })?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, encoded)
        .map_err(|e| format!("SYSTEM_ERROR: failed to write {}: {e}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("SYSTEM_ERROR: failed to replace {}: {e}", path.display()))?;

    Ok(next)
}
