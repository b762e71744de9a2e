//! Client-side harness for exercising a remote JSON HTTP API from tests.
//!
//! # Overview
//! - `ApiClient` owns one request context (base address + fixed headers) and
//!   exposes `fetch` / `create` / `replace` / `remove`, each returning a
//!   normalized `ResponseEnvelope`.
//! - `AuthManager` wraps an `ApiClient`, logs in against `/auth/login`, and
//!   rebuilds the context with the returned bearer token.
//! - `TestDataManager` is a keyed scratch store shared between test steps,
//!   plus timestamp-based generators for test emails and usernames.
//!
//! # Design
//! - Headers are immutable per context; authenticating builds a new context.
//! - Replacing or disposing a context always drops the previous one.
//! - Nothing is retried; every failure surfaces as an `ApiError`.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod store;
pub mod types;

pub use auth::{session_from_login, AuthManager, Session};
pub use client::{ApiClient, RequestContext};
pub use config::HarnessConfig;
pub use error::{ApiError, ApiResult};
pub use http::{HeaderSet, HttpMethod, ResponseEnvelope};
pub use store::{generate_test_email, generate_test_username, TestDataManager};
pub use types::{LoginRequest, LoginResponse, Product, ProductInput, ProductPage, User, UserId};
