//! LegoCharm resources
//!
//! Each resource reconciles one kind of LegoCharm entity against the
//! orchestration tool's state.
//!
//! # Resources
//!
//! - [`user`] - `legocharm_user`, an application user and its password
//! - [`user_domain_access`] - `legocharm_user_domain_access`, a user's grant
//!   on a domain
//!
//! # Example
//!
//! ```no_run
//! use legocharm_provider::framework::{ProviderHost, PlanAction};
//! use legocharm_provider::provider::LegoCharmProvider;
//! use serde_json::json;
//!
//! async fn example() {
//!     let mut host = ProviderHost::new(LegoCharmProvider::default());
//!     let env = |key: &str| std::env::var(key).ok();
//!     host.configure(&json!({}), &env);
//!
//!     let desired = json!({"username": "alice", "password": "s3cret"});
//!     let plan = host.plan("legocharm_user", None, Some(&desired)).unwrap();
//!     assert_eq!(plan.action, PlanAction::Create);
//!     let created = host.apply("legocharm_user", None, &plan).await;
//!     println!("{:?}", created.state);
//! }
//! ```

pub mod user;
pub mod user_domain_access;

pub use user::{UserModel, UserResource};
pub use user_domain_access::{UserDomainAccessModel, UserDomainAccessResource};

use crate::framework::{downcast_provider_data, Diagnostics, ProviderData};
use crate::legocharm::LegoCharmClient;
use std::sync::Arc;

/// Pull the API client out of the provider data
fn configure_client(
    provider_data: Option<&ProviderData>,
    diags: &mut Diagnostics,
) -> Option<Arc<LegoCharmClient>> {
    let data = provider_data?;
    downcast_provider_data::<LegoCharmClient>(data, "a LegoCharmClient", diags)
}

/// The configured client, or an error diagnostic when configure never ran
fn require_client<'a>(
    client: &'a Option<Arc<LegoCharmClient>>,
    diags: &mut Diagnostics,
) -> Option<&'a LegoCharmClient> {
    if client.is_none() {
        diags.add_error(
            "Client Not Configured",
            "The LegoCharm API client is not configured for this resource",
        );
    }
    client.as_deref()
}

/// Split a composite import key into exactly `expected.len()` non-empty parts
fn split_import_id<'a>(
    id: &'a str,
    expected: &[&str],
    diags: &mut Diagnostics,
) -> Option<Vec<&'a str>> {
    let parts: Vec<&str> = id.split(':').collect();
    if parts.len() != expected.len() || parts.iter().any(|p| p.is_empty()) {
        diags.add_error(
            "Invalid Import ID",
            format!("Import ID must be in the format '{}'", expected.join(":")),
        );
        return None;
    }
    Some(parts)
}
