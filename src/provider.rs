//! The `legocharm` provider
//!
//! Builds the LegoCharm API client from the provider block and registers the
//! user and user domain access resources.

use crate::config::ProviderConfig;
use crate::framework::{
    Diagnostics, EnvLookup, Provider, ProviderData, ProviderMetadata, ResourceFactory,
};
use crate::legocharm::LegoCharmClient;
use crate::resource::{UserDomainAccessResource, UserResource};
use serde_json::Value;
use std::sync::Arc;

pub const TYPE_NAME: &str = "legocharm";

/// Version injected at compile time via LEGOCHARM_PROVIDER_VERSION (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("LEGOCHARM_PROVIDER_VERSION") {
    Some(v) => v,
    None => "dev",
};

#[derive(Debug, Clone)]
pub struct LegoCharmProvider {
    version: String,
}

impl Default for LegoCharmProvider {
    fn default() -> Self {
        Self::new(VERSION)
    }
}

impl LegoCharmProvider {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }
}

impl Provider for LegoCharmProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            type_name: TYPE_NAME.to_string(),
            version: self.version.clone(),
        }
    }

    fn configure(&self, config: &Value, env: EnvLookup<'_>) -> (Option<ProviderData>, Diagnostics) {
        let mut diags = Diagnostics::new();

        let config = match ProviderConfig::from_json(config) {
            Ok(config) => config,
            Err(e) => {
                diags.add_error("Invalid Provider Configuration", format!("{:#}", e));
                return (None, diags);
            }
        };

        let (settings, resolve_diags) = config.resolve(env);
        diags.extend(resolve_diags);
        let Some(settings) = settings else {
            return (None, diags);
        };

        let client = match LegoCharmClient::new(
            &settings.address,
            &settings.username,
            &settings.password,
            settings.timeout,
        ) {
            Ok(client) => client,
            Err(e) => {
                diags.add_error(
                    "Unable to Create LegoCharm API Client",
                    format!(
                        "An unexpected error occurred when creating the LegoCharm API client. \
                         If the error is not clear, please contact the provider developers.\n\n\
                         LegoCharm Client Error: {}",
                        e
                    ),
                );
                return (None, diags);
            }
        };

        tracing::info!("LegoCharm API client configured for {}", client.base_url());
        let data: ProviderData = Arc::new(client);
        (Some(data), diags)
    }

    fn resources(&self) -> Vec<ResourceFactory> {
        vec![
            UserResource::factory as ResourceFactory,
            UserDomainAccessResource::factory as ResourceFactory,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ENV_ADDRESS, ENV_PASSWORD, ENV_USERNAME};
    use crate::framework::ProviderHost;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_metadata() {
        let provider = LegoCharmProvider::new("1.2.3");
        let metadata = provider.metadata();
        assert_eq!(metadata.type_name, "legocharm");
        assert_eq!(metadata.version, "1.2.3");
    }

    #[test]
    fn test_registers_resources() {
        let host = ProviderHost::new(LegoCharmProvider::default());
        assert_eq!(
            host.resource_types(),
            vec!["legocharm_user", "legocharm_user_domain_access"]
        );
    }

    #[test]
    fn test_configure_builds_client() {
        let provider = LegoCharmProvider::default();
        let (data, diags) = provider.configure(
            &json!({"address": "lego.example.com", "username": "admin", "password": "secret"}),
            &no_env,
        );
        assert!(!diags.has_error());
        let client = data.unwrap().downcast::<LegoCharmClient>().unwrap();
        assert_eq!(client.base_url(), "https://lego.example.com");
    }

    #[test]
    fn test_configure_from_env() {
        let env = |key: &str| match key {
            ENV_ADDRESS => Some("http://localhost:8000".to_string()),
            ENV_USERNAME => Some("admin".to_string()),
            ENV_PASSWORD => Some("secret".to_string()),
            _ => None,
        };
        let (data, diags) = LegoCharmProvider::default().configure(&json!({}), &env);
        assert!(!diags.has_error());
        assert!(data.is_some());
    }

    #[test]
    fn test_configure_reports_missing_settings() {
        let (data, diags) = LegoCharmProvider::default().configure(&json!({}), &no_env);
        assert!(data.is_none());
        assert_eq!(diags.errors().len(), 3);
    }

    #[test]
    fn test_configure_reports_bad_address() {
        let (data, diags) = LegoCharmProvider::default().configure(
            &json!({"address": "http://", "username": "admin", "password": "secret"}),
            &no_env,
        );
        assert!(data.is_none());
        assert_eq!(
            diags.errors()[0].summary,
            "Unable to Create LegoCharm API Client"
        );
    }

    #[test]
    fn test_configure_rejects_malformed_block() {
        let (data, diags) =
            LegoCharmProvider::default().configure(&json!({"address": 42}), &no_env);
        assert!(data.is_none());
        assert_eq!(diags.errors()[0].summary, "Invalid Provider Configuration");
    }
}
