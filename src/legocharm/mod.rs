//! LegoCharm API interaction module
//!
//! This module provides the client used by the provider's resources to talk
//! to the LegoCharm REST API.
//!
//! # Module Structure
//!
//! - [`client`] - Typed helpers for users, domains and domain access grants
//! - [`http`] - Authenticated HTTP wrapper and response handling
//! - [`models`] - Request and response bodies
//! - [`error`] - Client error type
//!
//! # Example
//!
//! ```no_run
//! use legocharm_provider::legocharm::{LegoCharmClient, DEFAULT_TIMEOUT};
//!
//! async fn example() -> legocharm_provider::legocharm::Result<()> {
//!     let client = LegoCharmClient::new("lego.example.com", "admin", "secret", DEFAULT_TIMEOUT)?;
//!     let user = client.get_user_by_username("alice").await?;
//!     println!("alice has id {}", user.id());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod models;

pub use client::{LegoCharmClient, DEFAULT_TIMEOUT};
pub use error::{ClientError, Result};
pub use models::{
    AccessLevel, Domain, DomainAccessRequest, DomainUserPermission, InvalidAccessLevel, UserCreate,
    UserData,
};

/// Last non-empty segment of a URL path
pub fn last_path_segment(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}
