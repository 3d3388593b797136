//! Usage: Consent UI library capability surface + a headless implementation.
//!
//! The browser build drives a third-party consent modal; this crate only depends on the
//! operations listed in [`ConsentLibrary`]. Which of them a given library supports is reported
//! once through [`ConsentCapabilities`] instead of being probed on every call.

use super::cookie_jar::Cookie;
use super::record::{ConsentCategory, ConsentCookie, ConsentRecord};
use crate::shared::error::{AppError, AppResult};
use crate::shared::mutex_ext::MutexExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsentCapabilities {
    pub run: bool,
    pub show: bool,
    pub show_preferences: bool,
    pub hide: bool,
    pub accept_category: bool,
    pub reject_category: bool,
    pub erase_cookies: bool,
}

impl ConsentCapabilities {
    pub const fn all() -> Self {
        Self {
            run: true,
            show: true,
            show_preferences: true,
            hide: true,
            accept_category: true,
            reject_category: true,
            erase_cookies: true,
        }
    }
}

/// Payload of the library's `onConsent` / `onChange` callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentEvent {
    pub categories: Vec<String>,
}

pub trait ConsentCallbacks: Send + Sync {
    /// Fired when consent is first given, and on each start while a valid consent exists.
    fn on_consent(&self, event: &ConsentEvent);

    fn on_change(&self, event: &ConsentEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryConfig {
    pub category: ConsentCategory,
    pub enabled: bool,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentConfig {
    pub revision: u32,
    pub language: String,
    pub categories: Vec<CategoryConfig>,
}

impl ConsentConfig {
    pub fn new(revision: u32, language: impl Into<String>) -> Self {
        let categories = ConsentCategory::ALL
            .into_iter()
            .map(|category| {
                let necessary = category == ConsentCategory::Necessary;
                CategoryConfig {
                    category,
                    enabled: necessary,
                    read_only: necessary,
                }
            })
            .collect();
        Self {
            revision,
            language: language.into(),
            categories,
        }
    }
}

fn unsupported(op: &str) -> AppError {
    AppError::new(
        "CONSENT_UNSUPPORTED",
        format!("consent library does not support {op}"),
    )
}

pub trait ConsentLibrary: Send + Sync {
    fn capabilities(&self) -> ConsentCapabilities;

    fn run(&self, _config: &ConsentConfig, _callbacks: Arc<dyn ConsentCallbacks>) -> AppResult<()> {
        Err(unsupported("run"))
    }

    fn show(&self) -> AppResult<()> {
        Err(unsupported("show"))
    }

    fn show_preferences(&self) -> AppResult<()> {
        Err(unsupported("show_preferences"))
    }

    fn hide(&self) -> AppResult<()> {
        Err(unsupported("hide"))
    }

    fn accept_category(&self, _categories: &[ConsentCategory]) -> AppResult<()> {
        Err(unsupported("accept_category"))
    }

    fn reject_category(&self, _categories: &[ConsentCategory]) -> AppResult<()> {
        Err(unsupported("reject_category"))
    }

    fn erase_cookies(&self, _names: &[&str], _path: &str, _domain: Option<&str>) -> AppResult<()> {
        Err(unsupported("erase_cookies"))
    }
}

/// Consent library without a modal: persists choices straight into the consent cookie.
pub struct HeadlessConsent {
    cookie: ConsentCookie,
    callbacks: Mutex<Option<Arc<dyn ConsentCallbacks>>>,
    visible: AtomicBool,
}

impl HeadlessConsent {
    pub fn new(cookie: ConsentCookie) -> Self {
        Self {
            cookie,
            callbacks: Mutex::new(None),
            visible: AtomicBool::new(false),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn update(&self, f: impl FnOnce(&mut ConsentRecord)) -> AppResult<()> {
        let previous = self.cookie.read();
        let first = previous.is_none();
        let mut record = previous.unwrap_or_else(|| {
            ConsentRecord::new(self.cookie.revision(), [ConsentCategory::Necessary])
        });
        f(&mut record);
        record.categories.insert(ConsentCategory::Necessary);
        self.cookie.write(&record)?;

        let callbacks = self.callbacks.lock_or_recover().clone();
        if let Some(callbacks) = callbacks {
            let event = ConsentEvent {
                categories: record.names(),
            };
            if first {
                callbacks.on_consent(&event);
            } else {
                callbacks.on_change(&event);
            }
        }
        Ok(())
    }
}

impl ConsentLibrary for HeadlessConsent {
    fn capabilities(&self) -> ConsentCapabilities {
        ConsentCapabilities::all()
    }

    fn run(&self, config: &ConsentConfig, callbacks: Arc<dyn ConsentCallbacks>) -> AppResult<()> {
        *self.callbacks.lock_or_recover() = Some(callbacks.clone());
        match self.cookie.read() {
            Some(record) => callbacks.on_consent(&ConsentEvent {
                categories: record.names(),
            }),
            None => self.visible.store(true, Ordering::SeqCst),
        }
        tracing::debug!(
            revision = config.revision,
            language = %config.language,
            "headless consent started"
        );
        Ok(())
    }

    fn show(&self) -> AppResult<()> {
        self.visible.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn show_preferences(&self) -> AppResult<()> {
        self.show()
    }

    fn hide(&self) -> AppResult<()> {
        self.visible.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn accept_category(&self, categories: &[ConsentCategory]) -> AppResult<()> {
        self.update(|record| record.categories.extend(categories.iter().copied()))?;
        self.visible.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn reject_category(&self, categories: &[ConsentCategory]) -> AppResult<()> {
        self.update(|record| {
            for category in categories {
                record.categories.remove(category);
            }
        })?;
        self.visible.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn erase_cookies(&self, names: &[&str], path: &str, domain: Option<&str>) -> AppResult<()> {
        for name in names {
            self.cookie.jar().set(Cookie::expired(*name, path, domain));
        }
        Ok(())
    }
}
