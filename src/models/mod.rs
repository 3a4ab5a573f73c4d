//! Data models for the catalog client

pub mod auth;
pub mod book;
pub mod borrow;
mod fields;
pub mod genre;
pub mod session;
pub mod user;

// Re-export commonly used types
pub use auth::{LoginCredentials, LoginShape, VerificationRequest};
pub use book::Book;
pub use borrow::Borrow;
pub use genre::Genre;
pub use session::{Session, TokenOrigin};
pub use user::{RegisterProfile, RegisteredEmail, Role, UpdateProfile, User};
