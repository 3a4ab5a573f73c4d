//! HTTP transport with the cross-cutting request/response handling:
//!
//! - the bearer token is attached to session-guarded requests from one place;
//! - a 401 gets at most one recovery attempt (token refresh) per request, then the
//!   session is cleared, `SessionExpired` is signalled and the user is redirected to
//!   login unless already on a public route;
//! - a 403 leaves the session alone and signals `AccessDenied`;
//! - a request without any response signals `NetworkUnreachable` and leaves the
//!   session alone, including when the refresh call is the one left unanswered;
//! - a rejection only ever clears the session whose token was sent.
//!
//! Every failure is logged and handed back to the caller; none is swallowed.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AuthPayload, ClientConfig};
use crate::error::{ClientError, ClientResult};
use crate::models::auth::{api_message, LoginShape};
use crate::models::session::TokenOrigin;
use crate::navigation::Navigator;
use crate::session::SessionContext;
use crate::signals::{Signal, SignalBus};

/// A request to the catalog API
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    /// Whether a 401/403 means "session problem" (as opposed to "bad credentials")
    session_guarded: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            session_guarded: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: &impl Serialize) -> ClientResult<Self> {
        let body = serde_json::to_value(body)
            .map_err(|e| ClientError::Validation(format!("Unserializable request body: {}", e)))?;
        self.body = Some(body);
        Ok(self)
    }

    /// Attach an authentication form either as query parameters or as a JSON body
    pub fn fields(mut self, fields: &impl Serialize, mode: AuthPayload) -> ClientResult<Self> {
        match mode {
            AuthPayload::Json => self.json(fields),
            AuthPayload::Query => {
                let value = serde_json::to_value(fields).map_err(|e| {
                    ClientError::Validation(format!("Unserializable request fields: {}", e))
                })?;
                if let Value::Object(map) = value {
                    for (key, value) in map {
                        match value {
                            Value::Null => {}
                            Value::String(s) => self.query.push((key, s)),
                            other => self.query.push((key, other.to_string())),
                        }
                    }
                }
                Ok(self)
            }
        }
    }

    /// Mark the request as part of the sign-in flow: a 401/403 there is a credential
    /// problem and is returned as-is instead of expiring the session
    pub fn public(mut self) -> Self {
        self.session_guarded = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A response that made it through the interceptor
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Raw `Authorization` response header, some login responses carry the token there
    pub authorization: Option<String>,
    pub body: Value,
}

impl ApiResponse {
    /// The body for 2xx responses, the classified error otherwise
    pub fn into_result(self) -> ClientResult<Value> {
        if self.status.is_success() {
            return Ok(self.body);
        }
        let message = api_message(&self.body).unwrap_or_else(|| {
            self.status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
        Err(ClientError::from_status(self.status, message))
    }
}

pub struct HttpTransport {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: Arc<SessionContext>,
    signals: SignalBus,
    navigator: Arc<dyn Navigator>,
}

impl HttpTransport {
    pub fn new(
        config: Arc<ClientConfig>,
        session: Arc<SessionContext>,
        signals: SignalBus,
        navigator: Arc<dyn Navigator>,
    ) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .user_agent(concat!("catalog-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            session,
            signals,
            navigator,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    /// Send a request through the interceptor.
    ///
    /// Non-success statuses other than the intercepted 401/403 are returned as
    /// responses; use [`HttpTransport::send_json`] to turn them into errors.
    pub async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let span = tracing::info_span!(
            "api_request",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        );
        self.intercept(request).instrument(span).await
    }

    /// Send and return the body of a successful response
    pub async fn send_json(&self, request: ApiRequest) -> ClientResult<Value> {
        let response = self.send(request).await?;
        let status = response.status;
        response.into_result().map_err(|e| {
            tracing::warn!("API answered {}: {}", status.as_u16(), e);
            e
        })
    }

    async fn intercept(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let mut retried = false;

        loop {
            // Sign-in requests never carry a credential
            let sent = if request.session_guarded {
                self.session.token()
            } else {
                None
            };
            let response = self.execute(&request, sent.as_deref()).await?;

            if !request.session_guarded {
                return Ok(response);
            }

            match response.status {
                StatusCode::UNAUTHORIZED => {
                    if !retried {
                        retried = true;
                        if self.session.token() != sent {
                            tracing::debug!("Session changed while the request was in flight, replaying");
                            continue;
                        }
                        if self.refresh_token(sent.as_deref()).await? {
                            tracing::debug!("Token refreshed, replaying request");
                            continue;
                        }
                    }
                    self.expire_session(&request.path, sent.as_deref());
                    let message = api_message(&response.body)
                        .unwrap_or_else(|| "Session expired".to_string());
                    return Err(ClientError::Authentication(message));
                }
                StatusCode::FORBIDDEN => {
                    tracing::warn!("Access denied to {}", request.path);
                    self.signals.emit(Signal::AccessDenied {
                        url: Some(request.path.clone()),
                    });
                    let message = api_message(&response.body)
                        .unwrap_or_else(|| "Access denied".to_string());
                    return Err(ClientError::AccessDenied(message));
                }
                _ => return Ok(response),
            }
        }
    }

    async fn execute(&self, request: &ApiRequest, token: Option<&str>) -> ClientResult<ApiResponse> {
        let url = self.url(&request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.unreachable(&request.path, e)),
        };

        let status = response.status();
        let authorization = response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Err(self.unreachable(&request.path, e)),
        };

        tracing::debug!("API responded {}", status.as_u16());

        Ok(ApiResponse {
            status,
            authorization,
            body: parse_body(&text),
        })
    }

    /// Try the configured refresh endpoint once with the token that was rejected.
    ///
    /// `Ok(false)` means the session cannot be recovered. A refresh call that gets no
    /// response is a network error, not a rejection, and leaves the session alone.
    /// Placeholder tokens are never refreshed.
    async fn refresh_token(&self, rejected: Option<&str>) -> ClientResult<bool> {
        let Some(ref path) = self.config.endpoints.refresh else {
            return Ok(false);
        };
        let Some(token) = rejected else {
            return Ok(false);
        };
        if TokenOrigin::of(token) == TokenOrigin::Synthesized {
            return Ok(false);
        }

        let response = self
            .execute(&ApiRequest::post(path.clone()).public(), Some(token))
            .await?;
        if !response.status.is_success() {
            tracing::info!("Token refresh rejected with {}", response.status.as_u16());
            return Ok(false);
        }

        let fresh = match LoginShape::classify(response.authorization.as_deref(), &response.body) {
            LoginShape::TopLevel { token, .. }
            | LoginShape::Enveloped { token, .. }
            | LoginShape::Header { token, .. } => token,
            LoginShape::NoToken { .. } => {
                tracing::warn!("Token refresh answered without a token");
                return Ok(false);
            }
        };

        match self.session.replace_token(token, fresh) {
            Ok(true) => Ok(true),
            Ok(false) => {
                // A newer login landed meanwhile; replay with it
                tracing::debug!("Session changed during token refresh, keeping the newer one");
                Ok(true)
            }
            Err(e) => {
                tracing::error!("Failed to store refreshed token: {}", e);
                Ok(false)
            }
        }
    }

    /// Clear the session that sent the rejected request, signal and redirect.
    /// A session established after the request went out is left untouched.
    fn expire_session(&self, path: &str, sent: Option<&str>) {
        if !self.session.clear_if_current(sent) {
            tracing::info!("Ignoring stale rejection on {}, a newer session is active", path);
            return;
        }
        tracing::warn!(was_authenticated = sent.is_some(), "Session rejected by the API on {}", path);

        self.signals.emit(Signal::SessionExpired {
            url: Some(path.to_string()),
        });

        let current = self.navigator.current_path();
        if self.config.is_public_route(&current) {
            tracing::debug!("Already on public route {}, not redirecting", current);
        } else {
            self.navigator.redirect(&self.config.routes.login);
        }
    }

    fn unreachable(&self, path: &str, e: reqwest::Error) -> ClientError {
        tracing::warn!("API unreachable for {}: {}", path, e);
        self.signals.emit(Signal::NetworkUnreachable {
            url: Some(path.to_string()),
        });
        ClientError::Network(e.to_string())
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.api.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Empty bodies become `null`, non-JSON bodies are kept as a string
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
