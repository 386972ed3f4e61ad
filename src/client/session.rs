use std::{sync::Arc, time::Duration};

use reqwest::{
    Client, Method, Response, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::storage::{SessionStorage, StorageError};
use crate::constants::*;
use crate::models::{AuthResponse, LoginPayload, PublicUser, RegisterPayload};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to encode request body: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("invalid header: {0}")]
    Header(String),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Receives the location the client should move to, e.g. after logout.
pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, location: &str) {
        self(location)
    }
}

struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, location: &str) {
        info!(location, "navigating");
    }
}

/// Caller options for [`SessionClient::authenticated_fetch`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::Header(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| ClientError::Header(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Session state kept in client storage, and the requests that depend on it.
///
/// Token and user profile are always written and cleared together.
pub struct SessionClient {
    http: Client,
    storage: Arc<dyn SessionStorage>,
    navigator: Box<dyn Navigator>,
}

impl SessionClient {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            http: Client::new(),
            storage,
            navigator: Box::new(LogNavigator),
        }
    }

    pub fn with_navigator(mut self, navigator: impl Navigator + 'static) -> Self {
        self.navigator = Box::new(navigator);
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// True iff a token is stored, whatever the profile entry holds.
    pub fn is_authenticated(&self) -> bool {
        self.storage.get(TOKEN_KEY).is_some()
    }

    pub fn get_token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY)
    }

    /// Missing or unreadable profiles both yield `None`.
    pub fn get_user(&self) -> Option<PublicUser> {
        let raw = self.storage.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "stored user profile is unreadable");
                None
            }
        }
    }

    pub fn store_session(&self, token: &str, user: &PublicUser) -> Result<(), ClientError> {
        let user = serde_json::to_string(user)?;
        self.storage
            .set_all(&[(TOKEN_KEY, token), (USER_KEY, user.as_str())])?;
        Ok(())
    }

    /// Clears token and profile together, then sends the client to the
    /// login location. No request is made.
    pub fn logout(&self) {
        if let Err(e) = self.storage.remove_all(&[TOKEN_KEY, USER_KEY]) {
            warn!(error = %e, "failed to clear session storage");
        }
        self.navigator.navigate(LOGIN_LOCATION);
    }

    /// Sends a request with the stored bearer token.
    ///
    /// Returns `Ok(None)` after logging out when there is no usable token or
    /// the server answers 401; the 401 body is dropped. An empty token counts
    /// as no token. Transport failures are logged and returned as errors.
    pub async fn authenticated_fetch(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<Option<Response>, ClientError> {
        let Some(token) = self.get_token().filter(|token| !token.is_empty()) else {
            self.logout();
            return Ok(None);
        };

        let bearer = match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => value,
            Err(_) => {
                warn!("stored token is not a valid header value");
                self.logout();
                return Ok(None);
            }
        };

        let mut headers = options.headers;
        headers.insert(AUTHORIZATION, bearer);

        let mut request = self.http.request(options.method, url).headers(headers);
        if let Some(body) = options.body {
            request = request.body(body);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            error!(url, error = %e, "API request failed");
            ClientError::Transport(e)
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(url, "token rejected, ending session");
            self.logout();
            return Ok(None);
        }

        Ok(Some(response))
    }

    pub async fn login(
        &self,
        base_url: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, ClientError> {
        let payload = LoginPayload {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.authenticate(&auth_url(base_url, "login"), &payload).await
    }

    pub async fn register(
        &self,
        base_url: &str,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, ClientError> {
        let payload = RegisterPayload {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.authenticate(&auth_url(base_url, "register"), &payload).await
    }

    async fn authenticate<T: Serialize>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<PublicUser, ClientError> {
        let response = self.http.post(url).json(payload).send().await.map_err(|e| {
            error!(url, error = %e, "API request failed");
            ClientError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let auth: AuthResponse = response.json().await?;
        self.store_session(&auth.token, &auth.user)?;
        Ok(auth.user)
    }
}

fn auth_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        AUTH_BASE_PATH,
        endpoint
    )
}
