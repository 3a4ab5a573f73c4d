//! User dashboard: profile and borrow history

use std::sync::Arc;

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    error::{ClientError, ClientResult},
    models::{
        borrow::Borrow,
        user::{UpdateProfile, User},
    },
    services::auth::AuthService,
    transport::{ApiRequest, HttpTransport},
};

/// What the dashboard header shows
#[derive(Debug, Clone)]
pub struct DashboardSummary {
    pub user: User,
    pub active_borrows: usize,
    pub overdue_borrows: usize,
    pub returned_borrows: usize,
}

impl DashboardSummary {
    pub fn from_parts(user: User, borrows: &[Borrow], now: DateTime<Utc>) -> Self {
        let active = borrows.iter().filter(|b| b.is_active()).count();
        Self {
            user,
            active_borrows: active,
            overdue_borrows: borrows.iter().filter(|b| b.is_overdue(now)).count(),
            returned_borrows: borrows.len() - active,
        }
    }
}

#[derive(Clone)]
pub struct DashboardService {
    transport: Arc<HttpTransport>,
    auth: AuthService,
}

impl DashboardService {
    pub fn new(transport: Arc<HttpTransport>, auth: AuthService) -> Self {
        Self { transport, auth }
    }

    pub async fn profile(&self) -> ClientResult<User> {
        self.auth.current_user().await
    }

    /// Update own profile; the cached user follows the server's answer
    pub async fn update_profile(&self, update: UpdateProfile) -> ClientResult<User> {
        let update = update.normalized();
        update.validate()?;
        if update.new_password.is_some() && update.current_password.is_none() {
            return Err(ClientError::Validation(
                "Current password required to change password".to_string(),
            ));
        }

        let path = self.transport.config().endpoints.my_profile.clone();
        let body = self
            .transport
            .send_json(ApiRequest::put(path).json(&update)?)
            .await?;

        let session = self.transport.session();
        let cached = session.snapshot().user().cloned().unwrap_or_default();
        let user = match User::from_value(&body) {
            Some(user) if user.id.is_some() || user.email.is_some() => user.merge_missing(&cached),
            // Empty or acknowledgement-only body
            _ => update.apply_to(&cached),
        };

        session.update_user(user.clone())?;
        tracing::info!("Profile updated");
        Ok(user)
    }

    pub async fn borrows(&self) -> ClientResult<Vec<Borrow>> {
        let path = self.transport.config().endpoints.my_borrows.clone();
        let body = self.transport.send_json(ApiRequest::get(path)).await?;
        Ok(Borrow::list_from_value(&body))
    }

    pub async fn summary(&self, now: DateTime<Utc>) -> ClientResult<DashboardSummary> {
        let user = self.profile().await?;
        let borrows = self.borrows().await?;
        Ok(DashboardSummary::from_parts(user, &borrows, now))
    }
}
