//! Plugin surface shared by the provider and its resources
//!
//! - [`diagnostics`] - Errors and warnings reported to the host
//! - [`schema`] - Attribute declarations and plan modifiers
//! - [`resource`] - The [`Resource`] lifecycle trait
//! - [`provider`] - The [`Provider`] trait
//! - [`host`] - Registration and lifecycle dispatch

pub mod diagnostics;
pub mod host;
pub mod provider;
pub mod resource;
pub mod schema;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use host::{Plan, PlanAction, ProviderHost};
pub use provider::{EnvLookup, Provider, ProviderMetadata, ResourceFactory};
pub use resource::{
    decode_model, downcast_provider_data, encode_model, ProviderData, Resource, ResourceResponse,
};
pub use schema::{Attribute, AttributeType, PlanModifier, Schema};
