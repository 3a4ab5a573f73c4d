//! Authentication service: registration, verification codes, login and session lifecycle

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use validator::Validate;

use crate::{
    error::{ClientError, ClientResult},
    models::{
        auth::{session_from_login, LoginCredentials, VerificationRequest},
        session::{token_expired, Session, TokenOrigin},
        user::{RegisterProfile, RegisteredEmail, User},
    },
    session::SessionContext,
    transport::{ApiRequest, HttpTransport},
};

#[derive(Clone)]
pub struct AuthService {
    transport: Arc<HttpTransport>,
}

impl AuthService {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }

    fn session(&self) -> &SessionContext {
        self.transport.session()
    }

    /// Ask the API whether an email can still be registered
    pub async fn check_email_available(&self, email: &str) -> ClientResult<bool> {
        let endpoints = &self.transport.config().endpoints;
        let body = self
            .transport
            .send_json(
                ApiRequest::get(endpoints.check_email.clone())
                    .query("email", email.trim())
                    .public(),
            )
            .await?;

        // `{ "available": bool }`, `{ "exists": bool }`, or a bare boolean meaning "exists"
        let available = match &body {
            Value::Bool(exists) => !exists,
            Value::Object(obj) => {
                let inner = match obj.get("data") {
                    Some(Value::Object(data)) => data,
                    Some(Value::Bool(exists)) => return Ok(!exists),
                    _ => obj,
                };
                if let Some(available) = inner.get("available").and_then(Value::as_bool) {
                    available
                } else if let Some(exists) = inner
                    .get("exists")
                    .or_else(|| inner.get("taken"))
                    .and_then(Value::as_bool)
                {
                    !exists
                } else {
                    return Err(ClientError::Server(
                        "Unrecognised email availability response".to_string(),
                    ));
                }
            }
            _ => {
                return Err(ClientError::Server(
                    "Unrecognised email availability response".to_string(),
                ))
            }
        };

        Ok(available)
    }

    /// Register a new account. Does not log in: a verification code is required first.
    pub async fn register(&self, profile: RegisterProfile) -> ClientResult<RegisteredEmail> {
        let profile = profile.normalized();
        profile.validate()?;

        let email = profile.email.clone();
        if !self.check_email_available(&email).await? {
            return Err(ClientError::Validation("Email is already registered".to_string()));
        }

        let config = self.transport.config();
        let request = ApiRequest::post(config.endpoints.register.clone())
            .fields(&profile, config.api.auth_payload)?
            .public();

        match self.transport.send_json(request).await {
            Ok(_) => {
                tracing::info!("Registered account for {}", email);
                Ok(RegisteredEmail { email })
            }
            Err(ClientError::Server(message)) if mentions_duplicate(&message) => {
                Err(ClientError::Validation(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Have the API email a one-time login code. Safe to call repeatedly.
    pub async fn request_verification_code(&self, email: &str) -> ClientResult<()> {
        let request = VerificationRequest {
            email: email.trim().to_lowercase(),
        };
        request.validate()?;

        let config = self.transport.config();
        self.transport
            .send_json(
                ApiRequest::post(config.endpoints.send_code.clone())
                    .fields(&request, config.api.auth_payload)?
                    .public(),
            )
            .await?;

        tracing::info!("Verification code requested for {}", request.email);
        Ok(())
    }

    /// Exchange credentials and the emailed code for a session.
    ///
    /// If another login is started before this one completes, the later one wins and
    /// this call returns [`ClientError::Superseded`].
    pub async fn login(&self, credentials: LoginCredentials) -> ClientResult<Session> {
        credentials.validate()?;

        let generation = self.session().begin_login();
        let config = self.transport.config();
        let request = ApiRequest::post(config.endpoints.login.clone())
            .fields(&credentials, config.api.auth_payload)?
            .public();

        let response = self.transport.send(request).await?;
        let session = session_from_login(
            response.status,
            response.authorization.as_deref(),
            &response.body,
            &credentials.email,
            Utc::now(),
        )
        .map_err(|e| {
            tracing::warn!("Login failed for {}: {}", credentials.email, e);
            e
        })?;

        self.session().establish_login(generation, session.clone())?;

        if session.token_origin() == Some(TokenOrigin::Synthesized) {
            tracing::warn!("Logged in {} with a placeholder token", credentials.email);
        } else {
            tracing::info!("Logged in {}", credentials.email);
        }
        Ok(session)
    }

    /// Forget the session locally. There is no server round trip.
    pub fn logout(&self) {
        if self.session().clear() {
            tracing::info!("Logged out");
        }
    }

    /// Restore the session persisted by a previous run, without contacting the API
    pub fn check_auth(&self) -> ClientResult<Session> {
        let session = self.session().rehydrate()?;

        let Some(token) = session.token() else {
            return Err(ClientError::Authentication("No stored session".to_string()));
        };

        if token_expired(token, Utc::now()) {
            tracing::info!("Stored token has expired, clearing session");
            self.session().clear();
            return Err(ClientError::Authentication("Stored session has expired".to_string()));
        }

        Ok(session)
    }

    /// Fetch the authenticated user and refresh the cached record
    pub async fn current_user(&self) -> ClientResult<User> {
        let path = self.transport.config().endpoints.me.clone();
        let body = self.transport.send_json(ApiRequest::get(path)).await?;

        let fetched = User::from_value(&body)
            .ok_or_else(|| ClientError::Server("Malformed user payload".to_string()))?;

        let user = match self.session().snapshot().user() {
            Some(cached) => fetched.merge_missing(cached),
            None => fetched,
        };

        self.session().update_user(user.clone())?;
        Ok(user)
    }

    pub fn session_snapshot(&self) -> Session {
        self.session().snapshot()
    }
}

fn mentions_duplicate(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("already") || message.contains("exists") || message.contains("taken")
}
