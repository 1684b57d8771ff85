//! `legocharm_user` resource
//!
//! Manages an application user. Every attribute forces replacement, so the
//! interesting work is in read: besides refreshing `email` and `id` it
//! re-probes the stored password and nulls it when LegoCharm rejects it,
//! which makes the next plan recreate the user.

use super::{configure_client, require_client, split_import_id};
use crate::framework::{
    decode_model, Attribute, Diagnostics, ProviderData, Resource, ResourceResponse, Schema,
};
use crate::legocharm::{LegoCharmClient, UserCreate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Pause between creating a user and reading it back
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// State of a `legocharm_user`
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserModel {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub id: Option<String>,
}

impl fmt::Debug for UserModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserModel")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("email", &self.email)
            .field("id", &self.id)
            .finish()
    }
}

/// LegoCharm reports a missing email as "", which must not show up as a
/// diff against an unset optional attribute
fn remote_email(remote: &str, configured: Option<&str>) -> Option<String> {
    if remote.is_empty() && configured.is_none() {
        None
    } else {
        Some(remote.to_string())
    }
}

pub struct UserResource {
    client: Option<Arc<LegoCharmClient>>,
    settle_delay: Duration,
}

impl Default for UserResource {
    fn default() -> Self {
        Self::new()
    }
}

impl UserResource {
    pub fn new() -> Self {
        Self {
            client: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn factory() -> Box<dyn Resource> {
        Box::new(Self::new())
    }

    /// Resource bound to an already-built client
    pub fn with_client(client: Arc<LegoCharmClient>) -> Self {
        Self {
            client: Some(client),
            ..Self::new()
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self, provider_type_name: &str) -> String {
        format!("{}_user", provider_type_name)
    }

    fn schema(&self) -> Schema {
        Schema::new("User resource for LegoCharm")
            .with_attribute(
                "username",
                Attribute::required_string()
                    .with_description("Username")
                    .requires_replace(),
            )
            .with_attribute(
                "password",
                Attribute::required_string()
                    .with_description("Password")
                    .sensitive()
                    .requires_replace(),
            )
            .with_attribute(
                "email",
                Attribute::optional_string()
                    .with_description("Email address")
                    .requires_replace(),
            )
            .with_attribute(
                "id",
                Attribute::computed_string()
                    .with_description("User id, the last path segment of the user's URL")
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
        let Some(mut data) = decode_model::<UserModel>(plan, &mut diags) else {
            return ResourceResponse::removed(diags);
        };
        let Some(client) = require_client(&self.client, &mut diags) else {
            return ResourceResponse::removed(diags);
        };

        let username = data.username.clone().unwrap_or_default();

        match client.get_user_by_username(&username).await {
            Ok(existing) => {
                diags.add_error(
                    "User Exists",
                    format!(
                        "A user with username '{}' already exists (id={}).",
                        username,
                        existing.id()
                    ),
                );
                return ResourceResponse::removed(diags);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to check for existing user: {}", e),
                );
                return ResourceResponse::removed(diags);
            }
        }

        let create = UserCreate {
            username: username.clone(),
            password: data.password.clone().unwrap_or_default(),
            email: data.email.clone().unwrap_or_default(),
            groups: Vec::new(),
        };
        if let Err(e) = client.create_user(&create).await {
            diags.add_error(
                "Client Error",
                format!("Unable to create user, got error: {}", e),
            );
            return ResourceResponse::removed(diags);
        }

        // LegoCharm may not list a new user immediately
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let user = match client.get_user_by_username(&username).await {
            Ok(user) => user,
            Err(e) => {
                diags.add_error(
                    "Client Error",
                    format!("User created but failed to read back: {}", e),
                );
                return ResourceResponse::removed(diags);
            }
        };

        data.id = Some(user.id().to_string());
        data.email = remote_email(&user.email, data.email.as_deref());

        tracing::info!("created user {} (id={})", username, user.id());
        ResourceResponse::from_model(&data, diags)
    }

    async fn read(&self, state: Value) -> ResourceResponse {
        let mut diags = Diagnostics::new();
        let Some(mut data) = decode_model::<UserModel>(state.clone(), &mut diags) else {
            return ResourceResponse::new(Some(state), diags);
        };
        let Some(client) = require_client(&self.client, &mut diags) else {
            return ResourceResponse::new(Some(state), diags);
        };

        let username = data.username.clone().unwrap_or_default();
        let user = match client.get_user_by_username(&username).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                tracing::warn!("user {} no longer exists, removing from state", username);
                return ResourceResponse::removed(diags);
            }
            Err(e) => {
                diags.add_error("Client Error", format!("Unable to read user: {}", e));
                return ResourceResponse::new(Some(state), diags);
            }
        };

        data.email = remote_email(&user.email, data.email.as_deref());
        data.id = Some(user.id().to_string());

        if let Some(password) = data.password.as_deref() {
            match client.has_valid_user_password(&username, password).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!("stored password for user {} was rejected", username);
                    diags.add_warning("Invalid Password", "The stored password is no longer valid");
                    data.password = None;
                }
                Err(e) => {
                    diags.add_error(
                        "Client Error",
                        format!("Unable to validate user password: {}", e),
                    );
                    return ResourceResponse::new(Some(state), diags);
                }
            }
        }

        ResourceResponse::from_model(&data, diags)
    }

    async fn update(&self, prior: Value, plan: Value) -> ResourceResponse {
        let mut diags = Diagnostics::new();
        let Some(mut data) = decode_model::<UserModel>(plan, &mut diags) else {
            return ResourceResponse::new(Some(prior), diags);
        };
        let Some(client) = require_client(&self.client, &mut diags) else {
            return ResourceResponse::new(Some(prior), diags);
        };

        let username = data.username.clone().unwrap_or_default();
        let user = match client.get_user_by_username(&username).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return ResourceResponse::removed(diags),
            Err(e) => {
                diags.add_error("Client Error", format!("Unable to read user: {}", e));
                return ResourceResponse::new(Some(prior), diags);
            }
        };

        data.email = remote_email(&user.email, data.email.as_deref());
        data.id = Some(user.id().to_string());

        if let Some(state) = decode_model::<UserModel>(prior, &mut diags) {
            if state.password.is_some() {
                data.password = state.password;
            }
        }

        ResourceResponse::from_model(&data, diags)
    }

    async fn delete(&self, state: Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let Some(data) = decode_model::<UserModel>(state, &mut diags) else {
            return diags;
        };
        let Some(client) = require_client(&self.client, &mut diags) else {
            return diags;
        };

        if let Some(id) = data.id.as_deref().filter(|id| !id.is_empty()) {
            if let Err(e) = client.delete_user_by_id(id).await {
                diags.add_error("Client Error", format!("Unable to delete user: {}", e));
            }
            return diags;
        }

        let username = data.username.unwrap_or_default();
        let user = match client.get_user_by_username(&username).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return diags,
            Err(e) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to locate user for deletion: {}", e),
                );
                return diags;
            }
        };

        if let Err(e) = client.delete_user_by_id(user.id()).await {
            diags.add_error("Client Error", format!("Unable to delete user: {}", e));
        }
        diags
    }

    async fn import_state(&self, id: &str) -> ResourceResponse {
        let mut diags = Diagnostics::new();
        let Some(parts) = split_import_id(id, &["username", "password"], &mut diags) else {
            return ResourceResponse::removed(diags);
        };

        let data = UserModel {
            username: Some(parts[0].to_string()),
            password: Some(parts[1].to_string()),
            ..Default::default()
        };
        ResourceResponse::from_model(&data, diags)
    }
}
