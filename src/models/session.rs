//! Client session model

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::user::User;

/// Prefix of tokens synthesized by the client when the API returned none
pub const PLACEHOLDER_TOKEN_PREFIX: &str = "local.";

/// Where the current token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenOrigin {
    /// Issued by the API
    Server,
    /// Placeholder built locally after a successful but tokenless login.
    /// The API never validates it; authenticated calls will most likely be rejected.
    Synthesized,
}

impl TokenOrigin {
    pub fn of(token: &str) -> Self {
        if token.starts_with(PLACEHOLDER_TOKEN_PREFIX) {
            TokenOrigin::Synthesized
        } else {
            TokenOrigin::Server
        }
    }
}

/// Proof of authentication plus cached identity.
///
/// Authentication is derived from the token alone: a session is authenticated
/// exactly when it holds a non-empty token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    token: Option<String>,
    user: Option<User>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build a session; blank tokens are treated as absent
    pub fn new(token: Option<String>, user: Option<User>) -> Self {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self { token, user }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token_origin(&self) -> Option<TokenOrigin> {
        self.token.as_deref().map(TokenOrigin::of)
    }

    pub(crate) fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    pub(crate) fn set_token(&mut self, token: String) {
        *self = Session::new(Some(token), self.user.take());
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Expiry of a JWT token, read without verifying the signature.
/// Returns `None` for opaque tokens and JWTs without an `exp` claim.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    if token.split('.').count() != 3 {
        return None;
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    data.claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
}

/// True when the token is a JWT whose expiry has passed
pub fn token_expired(token: &str, now: DateTime<Utc>) -> bool {
    token_expiry(token).map(|exp| exp <= now).unwrap_or(false)
}
