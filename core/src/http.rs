//! HTTP value types shared by the client and the session layer.
//!
//! # Design
//! `HeaderSet` is built once and never mutated: changing headers means
//! building a new set (`with_bearer`) and a new context from it. This keeps
//! the "a context's headers are fixed at creation" invariant structural.
//!
//! `ResponseEnvelope` is the single normalized shape every verb returns,
//! whatever the endpoint. Per-endpoint typing happens afterwards through
//! `ResponseEnvelope::json`.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Characters of a non-JSON body kept in a `Parse` error.
pub const PARSE_EXCERPT_CHARS: usize = 256;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Immutable header mapping bound to a request context.
///
/// Always carries `Accept` and `Content-Type` as JSON. Names are stored
/// lowercase so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSet {
    entries: BTreeMap<String, String>,
}

impl HeaderSet {
    /// JSON defaults plus caller-supplied extras. Extras may override the
    /// defaults except for being removed.
    pub fn base(extra: &BTreeMap<String, String>) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(ACCEPT.as_str().to_string(), JSON_MEDIA_TYPE.to_string());
        entries.insert(CONTENT_TYPE.as_str().to_string(), JSON_MEDIA_TYPE.to_string());
        for (name, value) in extra {
            entries.insert(name.to_ascii_lowercase(), value.clone());
        }
        Self { entries }
    }

    /// A new set identical to `self` plus `Authorization: Bearer <token>`.
    pub fn with_bearer(&self, token: &str) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(AUTHORIZATION.as_str().to_string(), format!("Bearer {token}"));
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn has_bearer(&self) -> bool {
        self.get(AUTHORIZATION.as_str())
            .is_some_and(|value| value.starts_with("Bearer "))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into reqwest default headers, rejecting invalid names/values.
    pub fn to_header_map(&self) -> ApiResult<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::InvalidHeader(format!("name '{name}': {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::InvalidHeader(format!("value for '{name}': {e}")))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

/// Normalized response returned by every `ApiClient` verb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub success: bool,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

impl ResponseEnvelope {
    /// Build an envelope from raw parts. An empty body becomes `Value::Null`;
    /// any other body must be valid JSON.
    pub fn from_parts(
        status: u16,
        headers: BTreeMap<String, String>,
        raw_body: &[u8],
    ) -> ApiResult<Self> {
        let body = if raw_body.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(raw_body).map_err(|source| ApiError::Parse {
                source,
                excerpt: Some(body_excerpt(raw_body)),
            })?
        };
        Ok(Self {
            status,
            success: is_success(status),
            body,
            headers,
        })
    }

    /// Decode the body into a typed structure.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_value(self.body.clone()).map_err(ApiError::parse)
    }

    /// The `message` string field of the body, if any.
    pub fn message(&self) -> Option<String> {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// The first `PARSE_EXCERPT_CHARS` characters of `raw_body`, lossily decoded.
fn body_excerpt(raw_body: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw_body);
    let mut chars = text.chars();
    let mut excerpt: String = chars.by_ref().take(PARSE_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        excerpt.push_str("...");
    }
    excerpt
}

/// 2xx check shared by envelopes and the session layer.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
