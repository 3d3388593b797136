//! Usage: Cookie surface abstraction (in-memory jar used headless and in tests).

use crate::shared::mutex_ext::MutexExt;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub const DEFAULT_COOKIE_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: Option<String>,
    /// `Some(0)` (or negative) expires the cookie immediately.
    pub max_age: Option<i64>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: DEFAULT_COOKIE_PATH.to_string(),
            domain: None,
            max_age: None,
        }
    }

    pub fn expired(name: impl Into<String>, path: &str, domain: Option<&str>) -> Self {
        Self::new(name, "")
            .with_path(path)
            .with_domain(domain)
            .with_max_age(0)
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn with_domain(mut self, domain: Option<&str>) -> Self {
        self.domain = domain.map(str::to_string);
        self
    }

    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.max_age.is_some_and(|v| v <= 0)
    }
}

/// Cookie storage visible to the client (`document.cookie` in a browser).
pub trait CookieJar: Send + Sync {
    /// First cookie named `name`, regardless of path/domain.
    fn get(&self, name: &str) -> Option<String>;

    /// Stores the cookie; an expired cookie deletes the matching name/path/domain entry.
    fn set(&self, cookie: Cookie);
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CookieKey {
    name: String,
    path: String,
    domain: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    inner: Mutex<BTreeMap<CookieKey, Cookie>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock_or_recover()
            .keys()
            .map(|k| k.name.clone())
            .collect();
        names.dedup();
        names
    }

    pub fn cookie(&self, name: &str) -> Option<Cookie> {
        self.inner
            .lock_or_recover()
            .values()
            .find(|c| c.name == name)
            .cloned()
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.cookie(name).map(|c| c.value)
    }

    fn set(&self, cookie: Cookie) {
        let key = CookieKey {
            name: cookie.name.clone(),
            path: cookie.path.clone(),
            domain: cookie.domain.clone(),
        };
        let mut inner = self.inner.lock_or_recover();
        if cookie.is_expired() {
            inner.remove(&key);
        } else {
            inner.insert(key, cookie);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_expire() {
        let jar = MemoryCookieJar::new();
        jar.set(Cookie::new("theme", "dark").with_max_age(3600));
        assert_eq!(jar.get("theme").as_deref(), Some("dark"));

        jar.set(Cookie::expired("theme", "/", None));
        assert_eq!(jar.get("theme"), None);
    }

    #[test]
    fn expiry_only_matches_same_path_and_domain() {
        let jar = MemoryCookieJar::new();
        jar.set(Cookie::new("_ga", "GA1.1").with_domain(Some(".localhub.store")));

        jar.set(Cookie::expired("_ga", "/", None));
        assert_eq!(jar.get("_ga").as_deref(), Some("GA1.1"));

        jar.set(Cookie::expired("_ga", "/", Some(".localhub.store")));
        assert_eq!(jar.get("_ga"), None);
        assert!(jar.names().is_empty());
    }
}
