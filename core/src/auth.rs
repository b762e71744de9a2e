//! Session state on top of one `ApiClient`.
//!
//! # Design
//! Login is two-phase: the token is only known once the login response
//! arrives, so the manager first opens an anonymous context, posts the
//! credentials, then replaces the context with one built from
//! `HeaderSet::with_bearer`. Interpreting the login response lives in
//! `session_from_login` so it can be exercised without a server.
//!
//! A rejected login leaves an anonymous context behind; `logout` reclaims it.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::config::HarnessConfig;
use crate::error::{ApiError, ApiResult};
use crate::http::ResponseEnvelope;
use crate::types::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, User};

pub const LOGIN_PATH: &str = "/auth/login";
pub const CURRENT_USER_PATH: &str = "/auth/me";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// The authenticated user and the credentials issued with them.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Turn a login response into a `Session`.
///
/// Non-2xx becomes `AuthenticationFailed` carrying the body's `message`.
pub fn session_from_login(envelope: &ResponseEnvelope) -> ApiResult<Session> {
    if !envelope.success {
        return Err(ApiError::AuthenticationFailed {
            status: envelope.status,
            message: envelope.message(),
        });
    }
    let response: LoginResponse = envelope.json()?;
    let token = response.resolved_token().map(str::to_string);
    Ok(Session {
        user: response.user,
        token,
        refresh_token: response.refresh_token,
    })
}

/// Drives login/logout and keeps the client's context authenticated.
#[derive(Debug)]
pub struct AuthManager {
    client: ApiClient,
    session: Option<Session>,
}

impl AuthManager {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            session: None,
        }
    }

    pub fn from_config(config: HarnessConfig) -> Self {
        Self::new(ApiClient::new(config))
    }

    pub async fn login(&mut self, username: &str, password: &str) -> ApiResult<&Session> {
        self.login_with(&LoginRequest::new(username, password)).await
    }

    pub async fn login_with(&mut self, request: &LoginRequest) -> ApiResult<&Session> {
        self.session = None;
        self.client.create_context(None)?;

        let envelope = self.client.create(LOGIN_PATH, request).await?;
        let session = match session_from_login(&envelope) {
            Ok(session) => session,
            Err(err) => {
                warn!(username = %request.username, status = envelope.status, "login rejected");
                return Err(err);
            }
        };

        match session.token.as_deref() {
            Some(token) => self.client.authenticate(token)?,
            None => debug!(username = %request.username, "login response carried no token"),
        }
        info!(
            username = session.user.display_name(),
            user_id = ?session.user.id,
            "logged in"
        );

        Ok(&*self.session.insert(session))
    }

    /// Fetch the profile of the logged-in user from the server.
    pub async fn get_current_user(&self) -> ApiResult<User> {
        let profile = self.get_current_user_raw().await?;
        serde_json::from_value(profile).map_err(ApiError::parse)
    }

    /// The profile body exactly as the server sent it.
    pub async fn get_current_user_raw(&self) -> ApiResult<Value> {
        if self.get_current_user_token().is_none() {
            return Err(ApiError::NoAuthenticatedUser);
        }
        let envelope = self.client.fetch(CURRENT_USER_PATH, &[]).await?;
        if !envelope.success {
            return Err(ApiError::ProfileFetchFailed {
                status: envelope.status,
            });
        }
        Ok(envelope.body)
    }

    /// Exchange the held refresh token for new tokens and rebuild the context.
    pub async fn refresh_session(&mut self) -> ApiResult<&Session> {
        let refresh_token = self
            .session
            .as_ref()
            .and_then(|session| session.refresh_token.clone())
            .ok_or(ApiError::NoAuthenticatedUser)?;

        let request = RefreshRequest {
            refresh_token,
            expires_in_mins: None,
        };
        let envelope = self.client.create(REFRESH_PATH, &request).await?;
        if !envelope.success {
            return Err(ApiError::AuthenticationFailed {
                status: envelope.status,
                message: envelope.message(),
            });
        }
        let refreshed: RefreshResponse = envelope.json()?;
        let token = refreshed
            .resolved_token()
            .map(str::to_string)
            .ok_or(ApiError::MissingToken {
                status: envelope.status,
            })?;

        self.client.authenticate(&token)?;
        let session = self.session.as_mut().ok_or(ApiError::NoAuthenticatedUser)?;
        session.token = Some(token);
        if refreshed.refresh_token.is_some() {
            session.refresh_token = refreshed.refresh_token;
        }
        debug!(username = session.user.display_name(), "session refreshed");
        Ok(&*session)
    }

    /// Forget the session and dispose the context. Idempotent.
    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            info!(username = session.user.display_name(), "logged out");
        }
        self.client.dispose();
    }

    pub fn get_current_user_token(&self) -> Option<&str> {
        self.session.as_ref().and_then(|session| session.token.as_deref())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The underlying client, for authenticated calls beyond the auth routes.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}
