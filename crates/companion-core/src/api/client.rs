//! API client for the companion backend.
//!
//! Every authenticated request reads the current access token from the
//! `Session`, so a token refreshed by one request is used by the next.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::ApiError;
use crate::auth::Session;
use crate::models::{Coordinate, NewLocation, Registration, UserInfo, UserLocationsCache};

/// Prefix of the session endpoints
const AUTH_PATH: &str = "/api/auth";

const LOCATIONS_PATH: &str = "/endpoint/locations";

const ADD_LOCATION_PATH: &str = "/endpoint/addLocation";

/// Server message that confirms an add-location request
const LOCATION_ADDED_MESSAGE: &str = "Location added successfully";

/// Called when the server rejects the session. The UI routes back to sign-in.
pub type LogoutHook = Arc<dyn Fn() + Send + Sync>;

/// What to do with a 401 on an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Run the logout hook and fail.
    LogoutOnUnauthorized,
    /// Try one silent token refresh and retry once; clear the session if refresh fails.
    RefreshOnce,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: Option<String>,
}

/// API client for the companion server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Session,
    policy: AuthPolicy,
    on_logout: Option<LogoutHook>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .field("has_logout_hook", &self.on_logout.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, session: Session, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            policy: AuthPolicy::LogoutOnUnauthorized,
            on_logout: None,
        })
    }

    /// Install the callback run when the session is rejected
    pub fn with_logout_hook(mut self, hook: LogoutHook) -> Self {
        self.on_logout = Some(hook);
        self
    }

    /// Refresh the access token once on a 401 instead of logging out straight away
    pub fn with_token_refresh(mut self) -> Self {
        self.policy = AuthPolicy::RefreshOnce;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidResponse(format!("Stored token is not a valid header: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    fn notify_logout(&self) {
        match self.on_logout {
            Some(ref hook) => hook(),
            None => error!("Logout function not available"),
        }
    }

    /// Send an authenticated request, applying the client's 401 policy.
    async fn send_authenticated(&self, method: Method, path: &str, body: Option<&Value>) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        let mut refreshed = false;

        loop {
            let token = self.session.access_token().await;
            let mut request = self
                .client
                .request(method.clone(), &url)
                .headers(Self::auth_headers(token.as_deref())?);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Self::check_response(response).await;
            }

            if self.policy == AuthPolicy::RefreshOnce && !refreshed {
                refreshed = true;
                match self.refresh_access_token().await {
                    Ok(_) => {
                        debug!(url = %url, "Retrying request with refreshed token");
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "Token refresh failed, clearing session");
                        self.session.clear().await;
                        self.notify_logout();
                        return Err(e);
                    }
                }
            }

            info!(url = %url, "Unauthorized request - logging out");
            self.notify_logout();
            return Err(ApiError::Unauthorized);
        }
    }

    async fn post_authenticated<T: DeserializeOwned>(&self, path: &str, body: Option<&Value>) -> Result<T, ApiError> {
        let response = self.send_authenticated(Method::POST, path, body).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
    }

    /// POST to an endpoint that does not take a bearer token
    async fn post_public<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .headers(Self::auth_headers(None)?)
            .json(body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
    }

    // ===== Session Endpoints =====

    /// Create an account. Does not log in.
    ///
    /// Returns `Ok(false)` when the server rejects the sign-up (for example
    /// an email that is already registered); transport and server failures
    /// are errors.
    pub async fn register(&self, registration: &Registration) -> Result<bool, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("{}/register", AUTH_PATH)))
            .headers(Self::auth_headers(None)?)
            .json(registration)
            .send()
            .await?;

        match Self::check_response(response).await {
            Ok(_) => {
                info!(email = %registration.email, "Registration successful");
                Ok(true)
            }
            Err(e) if e.is_rejection() => {
                warn!(error = %e, "Registration rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Exchange credentials for a session bundle and persist it
    pub async fn login(&self, email: &str, password: &str) -> Result<UserInfo, ApiError> {
        let info: UserInfo = self
            .post_public(&format!("{}/login", AUTH_PATH), &LoginRequest { email, password })
            .await?;
        if !info.has_access_token() {
            return Err(ApiError::InvalidResponse("Login response carried no access token".to_string()));
        }
        self.session.save(&info).await;
        info!("Login successful");
        Ok(info)
    }

    /// End the session. The local session is cleared even if the server call fails.
    pub async fn logout(&self) {
        if self.session.is_logged_in().await {
            if let Err(e) = self
                .client
                .post(self.url(&format!("{}/logout", AUTH_PATH)))
                .headers(Self::auth_headers(self.session.access_token().await.as_deref()).unwrap_or_default())
                .send()
                .await
            {
                warn!(error = %e, "Logout request failed");
            }
        }
        self.session.clear().await;
        info!("Logged out");
    }

    /// Delete the account behind the stored session, then clear the session.
    ///
    /// Fails with `NotAuthenticated` without contacting the server when no
    /// token is stored. On failure the session is kept.
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        if !self.session.is_logged_in().await {
            return Err(ApiError::NotAuthenticated);
        }
        self.send_authenticated(Method::DELETE, &format!("{}/delete-account", AUTH_PATH), None)
            .await?;
        self.session.clear().await;
        info!("Account deleted");
        Ok(())
    }

    /// Check the stored session with the server.
    ///
    /// Returns the stored bundle when the server accepts it, `None` when
    /// there is no session or verification fails.
    pub async fn verify(&self) -> Option<UserInfo> {
        if !self.session.is_logged_in().await {
            return None;
        }
        match self
            .send_authenticated(Method::POST, &format!("{}/verify", AUTH_PATH), None)
            .await
        {
            Ok(_) => self.session.user_info().await,
            Err(e) => {
                warn!(error = %e, "Session verification failed");
                None
            }
        }
    }

    /// Obtain a new access token with the stored refresh token and persist it
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let refresh_token = self
            .session
            .refresh_token()
            .await
            .ok_or_else(|| ApiError::RefreshFailed("No refresh token found".to_string()))?;

        let response: RefreshResponse = self
            .post_public(&format!("{}/refresh", AUTH_PATH), &RefreshRequest { refresh_token: &refresh_token })
            .await
            .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;

        self.session.set_access_token(response.access_token.clone()).await;
        info!("Access token refreshed");
        Ok(response.access_token)
    }

    // ===== Location Endpoints =====

    /// Fetch the user's saved locations listing
    pub async fn list_locations(&self) -> Result<UserLocationsCache, ApiError> {
        let data: Value = self.post_authenticated(LOCATIONS_PATH, None).await?;

        let (Some(locations), Some(details)) = (
            data.get("locations").and_then(Value::as_array),
            data.get("details").and_then(Value::as_array),
        ) else {
            return Err(ApiError::InvalidResponse(
                "Locations response is missing locations or details".to_string(),
            ));
        };

        let locations: Vec<Coordinate> = serde_json::from_value(Value::Array(locations.clone()))
            .map_err(|e| ApiError::InvalidResponse(format!("Malformed location coordinates: {}", e)))?;

        debug!(count = locations.len(), "Locations listing received");
        Ok(UserLocationsCache {
            locations,
            details: details.clone(),
        })
    }

    /// Save a new location. Returns whether the server confirmed it.
    pub async fn add_location(&self, location: &NewLocation) -> Result<bool, ApiError> {
        let body = serde_json::to_value(location)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode location: {}", e)))?;
        let response: MessageResponse = self.post_authenticated(ADD_LOCATION_PATH, Some(&body)).await?;
        Ok(response.message.as_deref() == Some(LOCATION_ADDED_MESSAGE))
    }
}
