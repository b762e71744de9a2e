//! Connection settings for the harness.

use std::collections::BTreeMap;

/// Environment variable holding the API base address.
pub const BASE_URL_ENV: &str = "API_BASE_URL";

/// Reference API used when `API_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";

/// Base address plus extra headers added to every context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    base_url: String,
    extra_headers: BTreeMap<String, String>,
}

impl HarnessConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            extra_headers: BTreeMap::new(),
        }
    }

    /// Read the base address from `API_BASE_URL`, falling back to the
    /// reference API.
    pub fn from_env() -> Self {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(base_url.trim())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.extra_headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn extra_headers(&self) -> &BTreeMap<String, String> {
        &self.extra_headers
    }

    /// Join `path` onto the base address, adding the leading slash if absent.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
