//! `legocharm_user_domain_access` resource
//!
//! Grants a user `domain` or `subdomain` access on an FQDN. LegoCharm has no
//! way to change a grant in place, so update deletes the old grant and creates
//! a new one.

use super::{configure_client, require_client, split_import_id};
use crate::framework::{
    decode_model, Attribute, Diagnostics, ProviderData, Resource, ResourceResponse, Schema,
};
use crate::legocharm::{AccessLevel, DomainAccessRequest, LegoCharmClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// State of a `legocharm_user_domain_access`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDomainAccessModel {
    pub user_id: Option<String>,
    pub domain: Option<String>,
    pub access_level: Option<String>,
    /// Composite key `user_id:domain:access_level`
    pub id: Option<String>,
    /// LegoCharm's id for the grant
    pub database_id: Option<i64>,
}

impl UserDomainAccessModel {
    fn composite_id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.user_id.as_deref().unwrap_or_default(),
            self.domain.as_deref().unwrap_or_default(),
            self.access_level.as_deref().unwrap_or_default()
        )
    }

    /// Validated request for creating this grant
    fn to_request(&self, diags: &mut Diagnostics) -> Option<DomainAccessRequest> {
        let raw = self.access_level.as_deref().unwrap_or_default();
        let access_level = match raw.parse::<AccessLevel>() {
            Ok(level) => level,
            Err(e) => {
                diags.add_attribute_error("access_level", "Invalid Access Level", e.to_string());
                return None;
            }
        };

        Some(DomainAccessRequest {
            user_id: self.user_id.clone().unwrap_or_default(),
            domain: self.domain.clone().unwrap_or_default(),
            access_level,
        })
    }

    fn identity_present(&self, diags: &mut Diagnostics) -> bool {
        if self.user_id.is_none() || self.domain.is_none() {
            diags.add_error("Invalid State", "User ID or Domain is null in state");
            return false;
        }
        true
    }

    fn require_database_id(&self, diags: &mut Diagnostics) -> Option<i64> {
        match self.database_id {
            Some(id) if id != 0 => Some(id),
            _ => {
                diags.add_error("Invalid State", "Database ID is null or zero in state");
                None
            }
        }
    }
}

#[derive(Default)]
pub struct UserDomainAccessResource {
    client: Option<Arc<LegoCharmClient>>,
}

impl UserDomainAccessResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> Box<dyn Resource> {
        Box::new(Self::new())
    }

    /// Resource bound to an already-built client
    pub fn with_client(client: Arc<LegoCharmClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl Resource for UserDomainAccessResource {
    fn type_name(&self, provider_type_name: &str) -> String {
        format!("{}_user_domain_access", provider_type_name)
    }

    fn schema(&self) -> Schema {
        Schema::new("User domain access resource for LegoCharm")
            .with_attribute(
                "user_id",
                Attribute::required_string()
                    .with_description("ID of user to grant domain access to")
                    .requires_replace(),
            )
            .with_attribute(
                "domain",
                Attribute::required_string()
                    .with_description("FQDN of the domain to grant access to")
                    .requires_replace(),
            )
            .with_attribute(
                "access_level",
                Attribute::required_string()
                    .with_description("Access level. Possible values: 'domain' 'subdomain'")
                    .requires_replace(),
            )
            .with_attribute(
                "id",
                Attribute::computed_string()
                    .with_description(
                        "The ID of the user domain access resource, in format 'user_id:domain:access_level'",
                    )
                    .use_state_for_unknown(),
            )
            .with_attribute(
                "database_id",
                Attribute::computed_int64()
                    .with_description("Internal database ID for the domain access permission")
                    .use_state_for_unknown(),
            )
    }

    fn configure(&mut self, provider_data: Option<&ProviderData>, diags: &mut Diagnostics) {
        if let Some(client) = configure_client(provider_data, diags) {
            self.client = Some(client);
        }
    }

    async fn create(&self, plan: Value) -> ResourceResponse {
        let mut diags = Diagnostics::new();
        let Some(mut data) = decode_model::<UserDomainAccessModel>(plan, &mut diags) else {
            return ResourceResponse::removed(diags);
        };
        let Some(client) = require_client(&self.client, &mut diags) else {
            return ResourceResponse::removed(diags);
        };
        let Some(request) = data.to_request(&mut diags) else {
            return ResourceResponse::removed(diags);
        };

        match client
            .get_domain_access(&request.user_id, &request.domain)
            .await
        {
            Ok(_) => {
                diags.add_error(
                    "Domain Access Already Exists",
                    "A domain access permission already exists for this user and domain combination.",
                );
                return ResourceResponse::removed(diags);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to check for existing domain access: {}", e),
                );
                return ResourceResponse::removed(diags);
            }
        }

        let grant = match client.create_domain_access(&request).await {
            Ok(grant) => grant,
            Err(e) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to create user domain access: {}", e),
                );
                return ResourceResponse::removed(diags);
            }
        };

        data.id = Some(data.composite_id());
        data.database_id = Some(grant.id);

        tracing::info!(
            "created domain access {} (database id {})",
            data.composite_id(),
            grant.id
        );
        ResourceResponse::from_model(&data, diags)
    }

    async fn read(&self, state: Value) -> ResourceResponse {
        let mut diags = Diagnostics::new();
        let Some(mut data) = decode_model::<UserDomainAccessModel>(state.clone(), &mut diags) else {
            return ResourceResponse::new(Some(state), diags);
        };
        let Some(client) = require_client(&self.client, &mut diags) else {
            return ResourceResponse::new(Some(state), diags);
        };
        if !data.identity_present(&mut diags) {
            return ResourceResponse::new(Some(state), diags);
        }

        let user_id = data.user_id.clone().unwrap_or_default();
        let domain = data.domain.clone().unwrap_or_default();
        let found = match client.get_domain_access(&user_id, &domain).await {
            Ok(found) => found,
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "domain access for user {} on {} no longer exists, removing from state",
                    user_id,
                    domain
                );
                return ResourceResponse::removed(diags);
            }
            Err(e) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to read user domain access: {}", e),
                );
                return ResourceResponse::new(Some(state), diags);
            }
        };

        data.access_level = Some(found.access_level);
        data.database_id = Some(found.id);
        if data.id.is_none() {
            data.id = Some(data.composite_id());
        }

        ResourceResponse::from_model(&data, diags)
    }

    async fn update(&self, prior: Value, plan: Value) -> ResourceResponse {
        let mut diags = Diagnostics::new();
        let Some(mut data) = decode_model::<UserDomainAccessModel>(plan, &mut diags) else {
            return ResourceResponse::new(Some(prior), diags);
        };
        let Some(client) = require_client(&self.client, &mut diags) else {
            return ResourceResponse::new(Some(prior), diags);
        };
        if !data.identity_present(&mut diags) {
            return ResourceResponse::new(Some(prior), diags);
        }

        if data.database_id.is_none() {
            if let Some(state) = decode_model::<UserDomainAccessModel>(prior.clone(), &mut diags) {
                data.database_id = state.database_id;
            }
        }
        let Some(database_id) = data.require_database_id(&mut diags) else {
            return ResourceResponse::new(Some(prior), diags);
        };
        let Some(request) = data.to_request(&mut diags) else {
            return ResourceResponse::new(Some(prior), diags);
        };

        if let Err(e) = client.delete_domain_access(database_id).await {
            diags.add_error(
                "Client Error",
                format!("Unable to delete user domain access: {}", e),
            );
            return ResourceResponse::new(Some(prior), diags);
        }

        let grant = match client.create_domain_access(&request).await {
            Ok(grant) => grant,
            Err(e) => {
                // The old grant is gone at this point
                diags.add_error(
                    "Client Error",
                    format!("Unable to update user domain access: {}", e),
                );
                return ResourceResponse::removed(diags);
            }
        };

        data.database_id = Some(grant.id);
        data.id = Some(data.composite_id());

        ResourceResponse::from_model(&data, diags)
    }

    async fn delete(&self, state: Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let Some(data) = decode_model::<UserDomainAccessModel>(state, &mut diags) else {
            return diags;
        };
        let Some(client) = require_client(&self.client, &mut diags) else {
            return diags;
        };
        let Some(database_id) = data.require_database_id(&mut diags) else {
            return diags;
        };

        if let Err(e) = client.delete_domain_access(database_id).await {
            diags.add_error(
                "Client Error",
                format!("Unable to delete user domain access: {}", e),
            );
        }
        diags
    }

    async fn import_state(&self, id: &str) -> ResourceResponse {
        let mut diags = Diagnostics::new();
        let Some(parts) =
            split_import_id(id, &["user_id", "domain", "access_level"], &mut diags)
        else {
            return ResourceResponse::removed(diags);
        };

        let data = UserDomainAccessModel {
            user_id: Some(parts[0].to_string()),
            domain: Some(parts[1].to_string()),
            access_level: Some(parts[2].to_string()),
            id: Some(id.to_string()),
            database_id: None,
        };
        if data.to_request(&mut diags).is_none() {
            return ResourceResponse::removed(diags);
        }
        ResourceResponse::from_model(&data, diags)
    }
}
