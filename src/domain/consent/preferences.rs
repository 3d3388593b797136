//! Usage: `theme` / `i18n_redirected` preference cookies, written only while their category is
//! accepted and erased as soon as it is not.

use super::cookie_jar::{Cookie, CookieJar};
use super::record::{ConsentCategory, ConsentRecord};
use super::{ConsentListener, ConsentStore};
use crate::shared::mutex_ext::MutexExt;
use std::sync::{Arc, Mutex};

pub const THEME_COOKIE: &str = "theme";
pub const LOCALE_COOKIE: &str = "i18n_redirected";
pub const DEFAULT_LOCALE: &str = "uk";

const PREFERENCE_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 365;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// In-memory theme/locale plus their consent-gated cookies.
pub struct PreferenceCookies {
    jar: Arc<dyn CookieJar>,
    path: String,
    theme: Mutex<Theme>,
    locale: Mutex<String>,
}

impl std::fmt::Debug for PreferenceCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceCookies")
            .field("path", &self.path)
            .field("theme", &self.theme())
            .field("locale", &self.locale())
            .finish()
    }
}

impl PreferenceCookies {
    pub fn new(store: &ConsentStore) -> Self {
        Self {
            jar: store.jar().clone(),
            path: store.cookie_path().to_string(),
            theme: Mutex::new(Theme::default()),
            locale: Mutex::new(DEFAULT_LOCALE.to_string()),
        }
    }

    pub fn theme(&self) -> Theme {
        *self.theme.lock_or_recover()
    }

    pub fn locale(&self) -> String {
        self.locale.lock_or_recover().clone()
    }

    /// Adopts the persisted preferences. A cookie whose category is not accepted is erased.
    pub fn restore(&self, store: &ConsentStore) {
        if store.accepted(ConsentCategory::Theme) {
            if let Some(theme) = self.jar.get(THEME_COOKIE).as_deref().and_then(Theme::parse) {
                *self.theme.lock_or_recover() = theme;
            }
        } else if self.jar.get(THEME_COOKIE).is_some() {
            store.erase_cookies(&[THEME_COOKIE], &self.path, None);
        }
        if store.accepted(ConsentCategory::I18n) {
            if let Some(locale) = self.jar.get(LOCALE_COOKIE).filter(|v| !v.trim().is_empty()) {
                *self.locale.lock_or_recover() = locale;
            }
        } else if self.jar.get(LOCALE_COOKIE).is_some() {
            store.erase_cookies(&[LOCALE_COOKIE], &self.path, None);
        }
    }

    /// Returns whether the cookie was written.
    pub fn set_theme(&self, store: &ConsentStore, theme: Theme) -> bool {
        *self.theme.lock_or_recover() = theme;
        self.sync(
            store,
            THEME_COOKIE,
            theme.as_str(),
            store.accepted(ConsentCategory::Theme),
        )
    }

    pub fn set_locale(&self, store: &ConsentStore, locale: &str) -> bool {
        let locale = locale.trim();
        if locale.is_empty() {
            return false;
        }
        *self.locale.lock_or_recover() = locale.to_string();
        self.sync(
            store,
            LOCALE_COOKIE,
            locale,
            store.accepted(ConsentCategory::I18n),
        )
    }

    fn sync(&self, store: &ConsentStore, name: &str, value: &str, accepted: bool) -> bool {
        if accepted {
            self.jar.set(
                Cookie::new(name, value)
                    .with_path(&self.path)
                    .with_max_age(PREFERENCE_MAX_AGE_SECS),
            );
        } else {
            store.erase_cookies(&[name], &self.path, None);
        }
        accepted
    }
}

impl ConsentListener for PreferenceCookies {
    fn on_consent_change(&self, store: &ConsentStore, record: &ConsentRecord, _first: bool) {
        let theme = self.theme();
        self.sync(
            store,
            THEME_COOKIE,
            theme.as_str(),
            record.contains(ConsentCategory::Theme),
        );
        let locale = self.locale();
        self.sync(
            store,
            LOCALE_COOKIE,
            &locale,
            record.contains(ConsentCategory::I18n),
        );
    }
}
