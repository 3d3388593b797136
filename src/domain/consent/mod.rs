//! Usage: Consent store: category queries backed by the consent cookie, library delegation, and
//! fan-out of consent changes to listeners (analytics, preference cookies).

pub mod cookie_jar;
pub mod library;
pub mod preferences;
pub mod record;

use crate::shared::error::AppResult;
use crate::shared::mutex_ext::MutexExt;
use cookie_jar::{Cookie, CookieJar};
use library::{
    ConsentCallbacks, ConsentCapabilities, ConsentConfig, ConsentEvent, ConsentLibrary,
};
use record::{ConsentCategory, ConsentCookie, ConsentRecord};
use std::sync::{Arc, Mutex, Weak};

/// Receives every consent change reported by the consent library.
pub trait ConsentListener: Send + Sync {
    /// `first` is true for `on_consent` (initial or replayed consent), false for `on_change`.
    fn on_consent_change(&self, store: &ConsentStore, record: &ConsentRecord, first: bool);
}

pub struct ConsentStore {
    cookie: ConsentCookie,
    library: Option<Arc<dyn ConsentLibrary>>,
    capabilities: ConsentCapabilities,
    listeners: Mutex<Vec<Arc<dyn ConsentListener>>>,
    this: Weak<ConsentStore>,
}

impl std::fmt::Debug for ConsentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentStore")
            .field("cookie", &self.cookie)
            .field("has_library", &self.library.is_some())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl ConsentStore {
    pub fn new(cookie: ConsentCookie, library: Option<Arc<dyn ConsentLibrary>>) -> Arc<Self> {
        let capabilities = match library.as_ref() {
            Some(library) => library.capabilities(),
            None => {
                tracing::warn!("consent library unavailable; consent operations are degraded");
                ConsentCapabilities::default()
            }
        };
        Arc::new_cyclic(|this| Self {
            cookie,
            library,
            capabilities,
            listeners: Mutex::new(Vec::new()),
            this: this.clone(),
        })
    }

    pub fn capabilities(&self) -> ConsentCapabilities {
        self.capabilities
    }

    pub fn jar(&self) -> &Arc<dyn CookieJar> {
        self.cookie.jar()
    }

    pub fn cookie_path(&self) -> &str {
        self.cookie.path()
    }

    pub fn cookie_domain(&self) -> Option<&str> {
        self.cookie.domain()
    }

    pub fn add_listener(&self, listener: Arc<dyn ConsentListener>) {
        self.listeners.lock_or_recover().push(listener);
    }

    /// Starts the consent library and subscribes to its callbacks.
    pub fn start(&self, config: &ConsentConfig) {
        let Some(library) = self.library.as_ref().filter(|_| self.capabilities.run) else {
            tracing::warn!("consent library cannot run; consent banner not started");
            return;
        };
        let callbacks: Arc<dyn ConsentCallbacks> = Arc::new(StoreCallbacks {
            store: self.this.clone(),
        });
        if let Err(err) = library.run(config, callbacks) {
            tracing::warn!(error = %err, "consent library failed to start");
        }
    }

    /// Current valid consent record, read from the cookie on every call.
    pub fn record(&self) -> Option<ConsentRecord> {
        self.cookie.read()
    }

    pub fn accepted(&self, category: ConsentCategory) -> bool {
        if category == ConsentCategory::Necessary {
            return true;
        }
        self.record().is_some_and(|record| record.contains(category))
    }

    /// `necessary` is always accepted; unknown names never are.
    pub fn accepted_category(&self, name: &str) -> bool {
        ConsentCategory::parse(name).is_some_and(|category| self.accepted(category))
    }

    pub fn rejected_category(&self, name: &str) -> bool {
        !self.accepted_category(name)
    }

    pub fn is_analytics_accepted(&self) -> bool {
        self.accepted(ConsentCategory::Analytics)
    }

    pub fn is_functionality_accepted(&self) -> bool {
        let Some(record) = self.record() else {
            return false;
        };
        record.contains(ConsentCategory::I18n) || record.contains(ConsentCategory::Theme)
    }

    pub fn has_valid_consent(&self) -> bool {
        self.record().is_some()
    }

    pub fn accept_category(&self, names: &[&str]) {
        let categories = parse_categories(names);
        let Some(library) = self
            .library
            .as_ref()
            .filter(|_| self.capabilities.accept_category)
        else {
            tracing::warn!(?names, "consent library cannot accept categories");
            return;
        };
        if let Err(err) = library.accept_category(&categories) {
            tracing::warn!(error = %err, ?names, "accept_category failed");
        }
    }

    pub fn reject_category(&self, names: &[&str]) {
        let categories: Vec<_> = parse_categories(names)
            .into_iter()
            .filter(|c| *c != ConsentCategory::Necessary)
            .collect();
        let Some(library) = self
            .library
            .as_ref()
            .filter(|_| self.capabilities.reject_category)
        else {
            tracing::warn!(?names, "consent library cannot reject categories");
            return;
        };
        if let Err(err) = library.reject_category(&categories) {
            tracing::warn!(error = %err, ?names, "reject_category failed");
        }
    }

    /// Deletes cookies via the library, or by writing expired cookies when it cannot.
    pub fn erase_cookies(&self, names: &[&str], path: &str, domain: Option<&str>) {
        if let Some(library) = self
            .library
            .as_ref()
            .filter(|_| self.capabilities.erase_cookies)
        {
            match library.erase_cookies(names, path, domain) {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(error = %err, "erase_cookies failed; expiring cookies manually")
                }
            }
        }

        let jar = self.cookie.jar();
        for name in names {
            jar.set(Cookie::expired(*name, path, None));
            if domain.is_some() {
                jar.set(Cookie::expired(*name, path, domain));
            }
        }
    }

    /// Opens the consent banner (falls back to the preferences modal).
    pub fn show(&self) {
        self.call_ui("show", |library, caps| {
            if caps.show {
                Some(library.show())
            } else if caps.show_preferences {
                Some(library.show_preferences())
            } else {
                None
            }
        });
    }

    /// Opens the preferences modal (falls back to the banner).
    pub fn show_settings(&self) {
        self.call_ui("show_settings", |library, caps| {
            if caps.show_preferences {
                Some(library.show_preferences())
            } else if caps.show {
                Some(library.show())
            } else {
                None
            }
        });
    }

    pub fn hide(&self) {
        self.call_ui("hide", |library, caps| caps.hide.then(|| library.hide()));
    }

    fn call_ui(
        &self,
        op: &'static str,
        f: impl FnOnce(&dyn ConsentLibrary, ConsentCapabilities) -> Option<AppResult<()>>,
    ) {
        let Some(library) = self.library.as_deref() else {
            tracing::warn!(op, "consent library unavailable");
            return;
        };
        match f(library, self.capabilities) {
            Some(Ok(())) => {}
            Some(Err(err)) => tracing::warn!(op, error = %err, "consent ui call failed"),
            None => tracing::warn!(op, "consent library does not support this operation"),
        }
    }

    fn handle_event(&self, event: &ConsentEvent, first: bool) {
        let record = ConsentRecord::from_names(self.cookie.revision(), &event.categories);
        tracing::debug!(categories = ?record.names(), first, "consent updated");
        let listeners = self.listeners.lock_or_recover().clone();
        for listener in listeners {
            listener.on_consent_change(self, &record, first);
        }
    }
}

fn parse_categories(names: &[&str]) -> Vec<ConsentCategory> {
    names
        .iter()
        .filter_map(|name| {
            let parsed = ConsentCategory::parse(name);
            if parsed.is_none() {
                tracing::warn!(category = %name, "unknown consent category ignored");
            }
            parsed
        })
        .collect()
}

struct StoreCallbacks {
    store: Weak<ConsentStore>,
}

impl ConsentCallbacks for StoreCallbacks {
    fn on_consent(&self, event: &ConsentEvent) {
        if let Some(store) = self.store.upgrade() {
            store.handle_event(event, true);
        }
    }

    fn on_change(&self, event: &ConsentEvent) {
        if let Some(store) = self.store.upgrade() {
            store.handle_event(event, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::cookie_jar::MemoryCookieJar;
    use super::library::HeadlessConsent;
    use super::record::ConsentCookieCodec;

    fn store_with_library() -> (Arc<MemoryCookieJar>, Arc<ConsentStore>) {
        let jar = Arc::new(MemoryCookieJar::new());
        let cookie = ConsentCookie::new(jar.clone(), ConsentCookieCodec::Plain, "cc_cookie", 0);
        let library: Arc<dyn ConsentLibrary> = Arc::new(HeadlessConsent::new(cookie.clone()));
        (jar, ConsentStore::new(cookie, Some(library)))
    }

    #[derive(Default)]
    struct Seen(Mutex<Vec<(Vec<String>, bool)>>);

    impl ConsentListener for Seen {
        fn on_consent_change(&self, _store: &ConsentStore, record: &ConsentRecord, first: bool) {
            self.0.lock_or_recover().push((record.names(), first));
        }
    }

    #[test]
    fn no_cookie_is_fail_closed() {
        let (_, store) = store_with_library();
        assert!(store.accepted_category("necessary"));
        assert!(!store.accepted_category("analytics"));
        assert!(store.rejected_category("analytics"));
        assert!(!store.has_valid_consent());
        assert!(!store.is_functionality_accepted());
    }

    #[test]
    fn cookie_categories_drive_queries() {
        let (jar, store) = store_with_library();
        jar.set(Cookie::new(
            "cc_cookie",
            r#"{"categories":["necessary","analytics"]}"#,
        ));

        assert!(store.accepted_category("analytics"));
        assert!(!store.accepted_category("theme"));
        assert!(!store.accepted_category("marketing"));
        assert!(store.is_analytics_accepted());
        assert!(store.has_valid_consent());
    }

    #[test]
    fn corrupt_cookie_counts_as_no_consent() {
        let (jar, store) = store_with_library();
        jar.set(Cookie::new("cc_cookie", "{not json"));
        assert!(!store.accepted_category("analytics"));
        assert!(store.accepted_category("necessary"));
    }

    #[test]
    fn accept_and_reject_fan_out_to_listeners() {
        let (_, store) = store_with_library();
        let seen = Arc::new(Seen::default());
        store.add_listener(seen.clone());
        store.start(&ConsentConfig::new(0, "uk"));

        store.accept_category(&["analytics", "theme"]);
        assert!(store.is_functionality_accepted());
        store.reject_category(&["analytics", "necessary"]);
        assert!(!store.is_analytics_accepted());

        let seen = seen.0.lock_or_recover().clone();
        assert_eq!(
            seen,
            vec![
                (
                    vec![
                        "necessary".to_string(),
                        "analytics".to_string(),
                        "theme".to_string()
                    ],
                    true
                ),
                (vec!["necessary".to_string(), "theme".to_string()], false),
            ]
        );
    }

    #[test]
    fn missing_library_degrades_without_panicking() {
        let jar = Arc::new(MemoryCookieJar::new());
        jar.set(Cookie::new("theme", "dark"));
        let cookie = ConsentCookie::new(jar.clone(), ConsentCookieCodec::Plain, "cc_cookie", 0);
        let store = ConsentStore::new(cookie, None);

        store.start(&ConsentConfig::new(0, "uk"));
        store.accept_category(&["analytics"]);
        store.show();
        store.show_settings();
        store.hide();
        assert!(!store.is_analytics_accepted());

        store.erase_cookies(&["theme"], "/", None);
        assert_eq!(jar.get("theme"), None);
    }

    #[test]
    fn manual_erase_also_clears_domain_scoped_cookie() {
        let jar = Arc::new(MemoryCookieJar::new());
        jar.set(Cookie::new("_ga", "GA1").with_domain(Some(".localhub.store")));
        jar.set(Cookie::new("_ga", "GA1"));
        let cookie = ConsentCookie::new(jar.clone(), ConsentCookieCodec::Plain, "cc_cookie", 0);
        let store = ConsentStore::new(cookie, None);

        store.erase_cookies(&["_ga"], "/", Some(".localhub.store"));
        assert!(jar.names().is_empty());
    }
}
