use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use url::Url;

/// A crawled resource. Two pages are the same page when their URL paths match
/// case-insensitively; scheme, host and query string are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    url: String,
    path: String,
}

impl Page {
    pub fn from_url(url: &Url) -> Self {
        Self { url: url.to_string(), path: url.path().to_string() }
    }

    /// Parses an absolute URL; relative or malformed input yields `None`.
    pub fn parse(url: &str) -> Option<Self> {
        Url::parse(url).ok().map(|u| Self::from_url(&u))
    }

    pub fn url(&self) -> &str { &self.url }
    pub fn path(&self) -> &str { &self.path }

    /// Identity key used for deduplication.
    pub fn key(&self) -> String { self.path.to_lowercase() }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool { self.key() == other.key() }
}

impl Eq for Page {}

impl Hash for Page {
    fn hash<H: Hasher>(&self, state: &mut H) { self.key().hash(state) }
}
