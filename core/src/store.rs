//! Keyed scratch storage shared between test steps.
//!
//! # Design
//! The store is an explicit value, not a global. Cloning a `TestDataManager`
//! shares the underlying map, so a fixture can hand the same store to every
//! step of a run while separate runs stay isolated. Callers namespace their
//! keys; the fixed-key helpers use `user_<id>`, `last_response` and
//! `auth_token`.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::http::ResponseEnvelope;

pub const LAST_RESPONSE_KEY: &str = "last_response";
pub const TOKEN_KEY: &str = "auth_token";
pub const TEST_EMAIL_DOMAIN: &str = "test.example.com";

#[derive(Debug, Clone, Default)]
pub struct TestDataManager {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl TestDataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.write().insert(key.into(), value.into());
    }

    /// `None` when the key was never written (or was deleted).
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Returns whether the key was present.
    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn set_user(&self, id: impl Display, data: impl Into<Value>) {
        self.set(user_key(id), data);
    }

    pub fn get_user(&self, id: impl Display) -> Option<Value> {
        self.get(&user_key(id))
    }

    pub fn set_last_response(&self, response: &ResponseEnvelope) -> ApiResult<()> {
        let value = serde_json::to_value(response).map_err(ApiError::Serialization)?;
        self.set(LAST_RESPONSE_KEY, value);
        Ok(())
    }

    /// The stored envelope; a value under the key that is not an envelope is
    /// a `Parse` error.
    pub fn get_last_response(&self) -> ApiResult<Option<ResponseEnvelope>> {
        self.get(LAST_RESPONSE_KEY)
            .map(|value| serde_json::from_value(value).map_err(ApiError::parse))
            .transpose()
    }

    pub fn set_token(&self, token: &str) {
        self.set(TOKEN_KEY, token);
    }

    pub fn get_token(&self) -> Option<String> {
        self.get(TOKEN_KEY)
            .and_then(|value| value.as_str().map(str::to_string))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn user_key(id: impl Display) -> String {
    format!("user_{id}")
}

/// `<name>_<epoch millis>@test.example.com`. Two calls in the same
/// millisecond return the same address.
pub fn generate_test_email(name: &str) -> String {
    format!("{}@{TEST_EMAIL_DOMAIN}", generate_test_username(name))
}

/// `<name>_<epoch millis>`.
pub fn generate_test_username(name: &str) -> String {
    format!("{name}_{}", timestamp_now_ms())
}

fn timestamp_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
