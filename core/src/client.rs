//! Request-context provider and verb-based API client.
//!
//! # Design
//! `ApiClient` owns at most one `RequestContext`. A context is a
//! `reqwest::Client` whose default headers are the context's `HeaderSet`, so
//! every request issued through it carries exactly those headers. Creating a
//! new context drops the old one first; there is never more than one live
//! connection pool per client.
//!
//! Every verb returns a `ResponseEnvelope` regardless of status. Interpreting
//! the status is the caller's job (see `AuthManager`).

use std::collections::BTreeMap;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::HarnessConfig;
use crate::error::{ApiError, ApiResult};
use crate::http::{HeaderSet, HttpMethod, ResponseEnvelope};

/// A network handle bound to a base address and a fixed header set.
#[derive(Debug)]
pub struct RequestContext {
    http: Client,
    headers: HeaderSet,
}

impl RequestContext {
    fn open(headers: HeaderSet) -> ApiResult<Self> {
        let http = Client::builder()
            .default_headers(headers.to_header_map()?)
            .build()?;
        Ok(Self { http, headers })
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn is_authenticated(&self) -> bool {
        self.headers.has_bearer()
    }
}

/// Scoped HTTP client exposing fetch/create/replace/remove.
#[derive(Debug)]
pub struct ApiClient {
    config: HarnessConfig,
    context: Option<RequestContext>,
}

impl ApiClient {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            context: None,
        }
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self::new(HarnessConfig::new(base_url))
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Build a fresh context, optionally authenticated, replacing and
    /// disposing the current one.
    pub fn create_context(&mut self, token: Option<&str>) -> ApiResult<()> {
        let base = HeaderSet::base(self.config.extra_headers());
        let headers = match token {
            Some(token) => base.with_bearer(token),
            None => base,
        };
        let context = RequestContext::open(headers)?;
        self.dispose();
        debug!(
            base_url = %self.config.base_url(),
            authenticated = context.is_authenticated(),
            "request context created"
        );
        self.context = Some(context);
        Ok(())
    }

    pub fn authenticate(&mut self, token: &str) -> ApiResult<()> {
        self.create_context(Some(token))
    }

    /// Release the live context. Safe to call when none exists.
    pub fn dispose(&mut self) {
        if self.context.take().is_some() {
            debug!(base_url = %self.config.base_url(), "request context disposed");
        }
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(RequestContext::is_authenticated)
    }

    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }

    pub async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<ResponseEnvelope> {
        self.send(HttpMethod::Get, path, query, None::<&()>).await
    }

    pub async fn create<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<ResponseEnvelope> {
        self.send(HttpMethod::Post, path, &[], Some(body)).await
    }

    pub async fn replace<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<ResponseEnvelope> {
        self.send(HttpMethod::Put, path, &[], Some(body)).await
    }

    pub async fn remove(&self, path: &str) -> ApiResult<ResponseEnvelope> {
        self.send(HttpMethod::Delete, path, &[], None::<&()>).await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> ApiResult<ResponseEnvelope> {
        let context = self.context.as_ref().ok_or(ApiError::ContextNotInitialized)?;
        let url = self.config.url_for(path);

        let mut request = context.http.request(method.as_reqwest(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            let payload = serde_json::to_vec(body).map_err(ApiError::Serialization)?;
            request = request.body(payload);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let bytes = response.bytes().await?;
        debug!(?method, %url, status, "request completed");

        ResponseEnvelope::from_parts(status, headers, &bytes)
    }
}

/// Flatten response headers to strings, skipping values that are not UTF-8.
fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}
