//! Usage: Consent categories, the canonical consent-cookie record, and its cookie codec.

use super::cookie_jar::{Cookie, CookieJar};
use crate::shared::error::AppResult;
use crate::shared::security::constant_time_eq;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeSet;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const CONSENT_COOKIE_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 182;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentCategory {
    Necessary,
    Analytics,
    I18n,
    Theme,
}

impl ConsentCategory {
    pub const ALL: [ConsentCategory; 4] = [
        ConsentCategory::Necessary,
        ConsentCategory::Analytics,
        ConsentCategory::I18n,
        ConsentCategory::Theme,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Necessary => "necessary",
            Self::Analytics => "analytics",
            Self::I18n => "i18n",
            Self::Theme => "theme",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Canonical consent-cookie payload: `{"revision": N, "categories": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentRecord {
    pub revision: u32,
    pub categories: BTreeSet<ConsentCategory>,
}

#[derive(Deserialize)]
struct RawConsentRecord {
    #[serde(default)]
    revision: u32,
    categories: Vec<String>,
}

impl ConsentRecord {
    /// `necessary` is always part of a record.
    pub fn new(revision: u32, categories: impl IntoIterator<Item = ConsentCategory>) -> Self {
        let mut categories: BTreeSet<ConsentCategory> = categories.into_iter().collect();
        categories.insert(ConsentCategory::Necessary);
        Self {
            revision,
            categories,
        }
    }

    /// Builds a record from library-reported names; unknown names are ignored.
    pub fn from_names<S: AsRef<str>>(revision: u32, names: &[S]) -> Self {
        Self::new(
            revision,
            names.iter().filter_map(|n| ConsentCategory::parse(n.as_ref())),
        )
    }

    pub fn contains(&self, category: ConsentCategory) -> bool {
        category == ConsentCategory::Necessary || self.categories.contains(&category)
    }

    pub fn names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.as_str().to_string()).collect()
    }

    fn from_json(raw: &str) -> Option<Self> {
        let parsed: RawConsentRecord = serde_json::from_str(raw).ok()?;
        Some(Self::from_names(parsed.revision, &parsed.categories))
    }
}

#[derive(Clone)]
pub enum ConsentCookieCodec {
    Plain,
    Signed { secret: Arc<[u8]> },
}

impl std::fmt::Debug for ConsentCookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => f.write_str("Plain"),
            Self::Signed { .. } => f.write_str("Signed { secret: <redacted> }"),
        }
    }
}

impl ConsentCookieCodec {
    pub fn from_secret(secret: Option<&str>) -> Self {
        match secret.map(str::trim).filter(|v| !v.is_empty()) {
            Some(secret) => Self::Signed {
                secret: Arc::from(secret.as_bytes()),
            },
            None => Self::Plain,
        }
    }

    pub fn encode(&self, record: &ConsentRecord) -> AppResult<String> {
        let json = serde_json::to_string(record)?;
        match self {
            Self::Plain => Ok(json),
            Self::Signed { secret } => {
                let signature = sign(secret, json.as_bytes());
                Ok(format!(
                    "{}.{}",
                    URL_SAFE_NO_PAD.encode(json.as_bytes()),
                    URL_SAFE_NO_PAD.encode(signature)
                ))
            }
        }
    }

    /// Any malformed, tampered, or legacy-shaped value decodes to `None`.
    pub fn decode(&self, raw: &str) -> Option<ConsentRecord> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            Self::Plain => ConsentRecord::from_json(raw),
            Self::Signed { secret } => {
                let (payload_b64, signature_b64) = raw.split_once('.')?;
                let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
                let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
                if !constant_time_eq(&sign(secret, &payload), &signature) {
                    tracing::warn!("consent cookie signature mismatch; ignoring cookie");
                    return None;
                }
                ConsentRecord::from_json(std::str::from_utf8(&payload).ok()?)
            }
        }
    }
}

fn sign(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return Vec::new();
    };
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// The persisted consent cookie: read lazily on every query, never cached.
#[derive(Clone)]
pub struct ConsentCookie {
    jar: Arc<dyn CookieJar>,
    codec: ConsentCookieCodec,
    name: String,
    path: String,
    domain: Option<String>,
    revision: u32,
}

impl std::fmt::Debug for ConsentCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentCookie")
            .field("codec", &self.codec)
            .field("name", &self.name)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("revision", &self.revision)
            .finish()
    }
}

impl ConsentCookie {
    pub fn new(
        jar: Arc<dyn CookieJar>,
        codec: ConsentCookieCodec,
        name: impl Into<String>,
        revision: u32,
    ) -> Self {
        Self {
            jar,
            codec,
            name: name.into(),
            path: super::cookie_jar::DEFAULT_COOKIE_PATH.to_string(),
            domain: None,
            revision,
        }
    }

    pub fn with_scope(mut self, path: &str, domain: Option<&str>) -> Self {
        self.path = path.to_string();
        self.domain = domain.map(str::to_string);
        self
    }

    pub fn jar(&self) -> &Arc<dyn CookieJar> {
        &self.jar
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Current valid record; a revision mismatch counts as no consent.
    pub fn read(&self) -> Option<ConsentRecord> {
        let raw = self.jar.get(&self.name)?;
        let record = self.codec.decode(&raw)?;
        if record.revision != self.revision {
            tracing::debug!(
                stored_revision = record.revision,
                expected_revision = self.revision,
                "consent cookie revision is stale"
            );
            return None;
        }
        Some(record)
    }

    pub fn write(&self, record: &ConsentRecord) -> AppResult<()> {
        let value = self.codec.encode(record)?;
        self.jar.set(
            Cookie::new(self.name.as_str(), value)
                .with_path(&self.path)
                .with_domain(self.domain.as_deref())
                .with_max_age(CONSENT_COOKIE_MAX_AGE_SECS),
        );
        Ok(())
    }

    pub fn erase(&self) {
        self.jar.set(Cookie::expired(
            self.name.as_str(),
            &self.path,
            self.domain.as_deref(),
        ));
    }
}
