//! Library catalog client
//!
//! Client-side session management, catalog browsing and user dashboard over the
//! library REST API. The session (bearer token plus cached user) is owned by a
//! [`session::SessionContext`] injected into the [`transport::HttpTransport`], which
//! applies authentication and error handling uniformly to every request and reports
//! cross-cutting conditions on a [`signals::SignalBus`].

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;
pub mod navigation;
pub mod services;
pub mod session;
pub mod signals;
pub mod storage;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};

use models::Session;
use navigation::{Navigator, RouteTracker};
use services::Services;
use session::SessionContext;
use signals::SignalBus;
use storage::{FileStore, MemoryStore, SessionStore};
use transport::HttpTransport;

/// Everything a front end needs, wired from one configuration
#[derive(Clone)]
pub struct CatalogClient {
    pub config: Arc<ClientConfig>,
    pub services: Services,
    session: Arc<SessionContext>,
    signals: SignalBus,
}

impl CatalogClient {
    /// Build a client with the configured storage and an in-process navigator
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let store: Arc<dyn SessionStore> = match config.storage.path {
            Some(ref path) => Arc::new(FileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        Self::with_parts(config, store, Arc::new(RouteTracker::default()))
    }

    /// Build a client around a caller-provided store and navigator
    pub fn with_parts(
        config: ClientConfig,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> ClientResult<Self> {
        let config = Arc::new(config);
        let session = Arc::new(SessionContext::new(store, &config.storage));
        let signals = SignalBus::new();
        let transport = Arc::new(HttpTransport::new(
            config.clone(),
            session.clone(),
            signals.clone(),
            navigator,
        )?);

        Ok(Self {
            config,
            services: Services::new(transport),
            session,
            signals,
        })
    }

    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }
}
