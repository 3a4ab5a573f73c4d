//! Client-side services over the catalog API

pub mod auth;
pub mod catalog;
pub mod dashboard;

use std::sync::Arc;

use crate::transport::HttpTransport;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub dashboard: dashboard::DashboardService,
}

impl Services {
    /// Create all services sharing one transport
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        let auth = auth::AuthService::new(transport.clone());
        Self {
            catalog: catalog::CatalogService::new(transport.clone()),
            dashboard: dashboard::DashboardService::new(transport, auth.clone()),
            auth,
        }
    }
}
