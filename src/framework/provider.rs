//! Provider trait

use super::diagnostics::Diagnostics;
use super::resource::{ProviderData, Resource};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderMetadata {
    /// Prefix of every resource type name
    pub type_name: String,
    pub version: String,
}

/// Constructor for a resource, called once per host
pub type ResourceFactory = fn() -> Box<dyn Resource>;

/// Environment lookup used while configuring
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub trait Provider: Send + Sync {
    fn metadata(&self) -> ProviderMetadata;

    /// Build the data shared with resources from the provider block
    fn configure(&self, config: &Value, env: EnvLookup<'_>) -> (Option<ProviderData>, Diagnostics);

    fn resources(&self) -> Vec<ResourceFactory>;
}
