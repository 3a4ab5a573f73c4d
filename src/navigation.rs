//! Location and redirect seam between the transport and whatever renders the UI

use std::sync::Mutex;

/// Where the user currently is, and how to send them elsewhere
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn redirect(&self, path: &str);
}

/// In-process navigator that only records locations
pub struct RouteTracker {
    current: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl RouteTracker {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(start.into()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    /// Record a user-initiated move
    pub fn visit(&self, path: impl Into<String>) {
        if let Ok(mut current) = self.current.lock() {
            *current = path.into();
        }
    }

    /// Redirects issued so far, oldest first
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for RouteTracker {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for RouteTracker {
    fn current_path(&self) -> String {
        self.current.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn redirect(&self, path: &str) {
        tracing::info!("Redirecting to {}", path);
        if let Ok(mut redirects) = self.redirects.lock() {
            redirects.push(path.to_string());
        }
        self.visit(path);
    }
}
