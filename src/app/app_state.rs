//! Usage: Wires settings and host-provided collaborators into one client state.

use crate::api::Api;
use crate::client::hooks::{ClientHooks, LogOnlyHooks};
use crate::client::ApiClient;
use crate::domain::consent::cookie_jar::{CookieJar, MemoryCookieJar};
use crate::domain::consent::library::{ConsentConfig, ConsentLibrary, HeadlessConsent};
use crate::domain::consent::preferences::{PreferenceCookies, DEFAULT_LOCALE};
use crate::domain::consent::record::{ConsentCookie, ConsentCookieCodec};
use crate::domain::consent::ConsentStore;
use crate::domain::session::SessionStore;
use crate::infra::settings::ClientSettings;
use crate::infra::storage::{DurableStorage, MemoryStorage, SqliteStorage};
use crate::shared::error::AppResult;
use crate::telemetry::page_views::PageViewTracker;
use crate::telemetry::{AnalyticsConsentListener, AnalyticsSink, TelemetryGate, TracingSink};
use std::sync::Arc;

const DEFAULT_PAGE_TITLE: &str = "LocalHub";

/// Which consent library backs the consent store.
pub enum ConsentBackend {
    /// Built-in library that persists choices straight into the consent cookie.
    Headless,
    /// Factory for a host library bound to the configured consent cookie.
    Library(Box<dyn FnOnce(ConsentCookie) -> Arc<dyn ConsentLibrary> + Send>),
    /// No library: consent can be read but not changed.
    Unavailable,
}

/// Host-provided collaborators. `headless()` gives in-memory stand-ins for all of them.
pub struct AppDeps {
    pub cookies: Arc<dyn CookieJar>,
    pub consent: ConsentBackend,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub hooks: Arc<dyn ClientHooks>,
    /// Overrides the storage chosen from settings.
    pub storage: Option<Arc<dyn DurableStorage>>,
}

impl AppDeps {
    pub fn headless() -> Self {
        Self {
            cookies: Arc::new(MemoryCookieJar::new()),
            consent: ConsentBackend::Headless,
            analytics: Arc::new(TracingSink),
            hooks: Arc::new(LogOnlyHooks),
            storage: None,
        }
    }
}

pub struct AppState {
    pub settings: ClientSettings,
    pub session: Arc<SessionStore>,
    pub consent: Arc<ConsentStore>,
    pub preferences: Arc<PreferenceCookies>,
    pub telemetry: Arc<TelemetryGate>,
    pub page_views: PageViewTracker,
    pub api: Api,
}

impl AppState {
    pub fn build(settings: ClientSettings, deps: AppDeps) -> AppResult<Self> {
        let storage = match deps.storage {
            Some(storage) => storage,
            None => open_storage(&settings)?,
        };
        let session = Arc::new(SessionStore::new(storage));
        session.load();

        let consent_settings = &settings.consent;
        let cookie = ConsentCookie::new(
            deps.cookies,
            ConsentCookieCodec::from_secret(consent_settings.cookie_secret.as_deref()),
            consent_settings.cookie_name.as_str(),
            consent_settings.revision,
        )
        .with_scope(
            &consent_settings.cookie_path,
            consent_settings.cookie_domain.as_deref(),
        );
        let library: Option<Arc<dyn ConsentLibrary>> = match deps.consent {
            ConsentBackend::Headless => {
                Some(Arc::new(HeadlessConsent::new(cookie.clone())) as Arc<dyn ConsentLibrary>)
            }
            ConsentBackend::Library(factory) => Some(factory(cookie.clone())),
            ConsentBackend::Unavailable => None,
        };
        let consent = ConsentStore::new(cookie, library);

        let preferences = Arc::new(PreferenceCookies::new(&consent));
        consent.add_listener(preferences.clone());
        consent.add_listener(Arc::new(AnalyticsConsentListener::new(deps.analytics.clone())));
        // Restore first: starting replays the stored consent, which rewrites preference cookies.
        preferences.restore(&consent);
        consent.start(&ConsentConfig::new(consent_settings.revision, DEFAULT_LOCALE));

        let telemetry = Arc::new(TelemetryGate::new(
            consent.clone(),
            deps.analytics,
            settings.analytics.measurement_id.as_str(),
            settings.analytics.default_currency.as_str(),
        ));
        let page_views = PageViewTracker::new(telemetry.clone(), DEFAULT_PAGE_TITLE);

        let client = Arc::new(ApiClient::new(&settings, session.clone(), deps.hooks)?);
        let api = Api::new(client, settings.auth.clone());

        tracing::info!(
            api_base = %settings.api_base,
            authenticated = session.is_authenticated(),
            consent = consent.has_valid_consent(),
            "client state ready"
        );

        Ok(Self {
            settings,
            session,
            consent,
            preferences,
            telemetry,
            page_views,
            api,
        })
    }
}

fn open_storage(settings: &ClientSettings) -> AppResult<Arc<dyn DurableStorage>> {
    Ok(match settings.storage.db_path.as_deref() {
        Some(path) => Arc::new(SqliteStorage::open(path)?),
        None => Arc::new(MemoryStorage::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::consent::cookie_jar::Cookie;
    use crate::domain::session::{SessionPatch, TokenPatch};

    #[test]
    fn headless_state_starts_without_consent_or_session() {
        let state = AppState::build(ClientSettings::default(), AppDeps::headless()).expect("build");
        assert!(!state.session.is_authenticated());
        assert!(!state.consent.has_valid_consent());
        assert!(!state.telemetry.is_enabled());
        assert_eq!(state.api.client().default_authorization(), None);
    }

    #[test]
    fn persisted_session_and_consent_are_picked_up() {
        let storage: Arc<dyn DurableStorage> = Arc::new(MemoryStorage::new());
        SessionStore::new(storage.clone()).save(SessionPatch::tokens(TokenPatch::access("A")));

        let jar = Arc::new(MemoryCookieJar::new());
        jar.set(Cookie::new(
            "cc_cookie",
            r#"{"categories":["necessary","analytics","theme"]}"#,
        ));
        jar.set(Cookie::new("theme", "dark"));

        let deps = AppDeps {
            cookies: jar,
            storage: Some(storage),
            ..AppDeps::headless()
        };
        let state = AppState::build(ClientSettings::default(), deps).expect("build");

        assert!(state.session.is_authenticated());
        assert_eq!(
            state.api.client().default_authorization().as_deref(),
            Some("A")
        );
        assert!(state.telemetry.is_enabled());
        assert_eq!(
            state.preferences.theme(),
            crate::domain::consent::preferences::Theme::Dark
        );
    }
}
