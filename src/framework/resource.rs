//! Resource lifecycle trait
//!
//! A resource reconciles one kind of remote entity. The host hands it states
//! as JSON objects keyed by attribute name and gets back the new state plus
//! diagnostics.

use super::diagnostics::Diagnostics;
use super::schema::Schema;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Opaque value the provider passes to each resource on configure
pub type ProviderData = Arc<dyn Any + Send + Sync>;

/// Outcome of a lifecycle call. `state == None` removes the resource from
/// the host's state.
#[derive(Debug, Default)]
pub struct ResourceResponse {
    pub state: Option<Value>,
    pub diagnostics: Diagnostics,
}

impl ResourceResponse {
    pub fn new(state: Option<Value>, diagnostics: Diagnostics) -> Self {
        Self { state, diagnostics }
    }

    /// Response that removes the resource from state
    pub fn removed(diagnostics: Diagnostics) -> Self {
        Self {
            state: None,
            diagnostics,
        }
    }

    /// Serialize `model` as the new state
    pub fn from_model<T: Serialize>(model: &T, mut diagnostics: Diagnostics) -> Self {
        let state = encode_model(model, &mut diagnostics);
        Self { state, diagnostics }
    }
}

#[async_trait]
pub trait Resource: Send + Sync {
    /// Full type name, e.g. `legocharm_user`
    fn type_name(&self, provider_type_name: &str) -> String;

    fn schema(&self) -> Schema;

    /// Receive the provider's data. `None` means the provider is not
    /// configured yet, which is not an error.
    fn configure(&mut self, provider_data: Option<&ProviderData>, diags: &mut Diagnostics);

    async fn create(&self, plan: Value) -> ResourceResponse;

    async fn read(&self, state: Value) -> ResourceResponse;

    async fn update(&self, prior: Value, plan: Value) -> ResourceResponse;

    async fn delete(&self, state: Value) -> Diagnostics;

    /// Seed state from a composite import key
    async fn import_state(&self, id: &str) -> ResourceResponse;
}

/// Decode a state or plan object into a resource model
pub fn decode_model<T: DeserializeOwned>(value: Value, diags: &mut Diagnostics) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(model) => Some(model),
        Err(e) => {
            diags.add_error(
                "Value Conversion Error",
                format!("Unable to decode resource data: {}", e),
            );
            None
        }
    }
}

/// Encode a resource model as a state object
pub fn encode_model<T: Serialize>(model: &T, diags: &mut Diagnostics) -> Option<Value> {
    match serde_json::to_value(model) {
        Ok(value) => Some(value),
        Err(e) => {
            diags.add_error(
                "Value Conversion Error",
                format!("Unable to encode resource data: {}", e),
            );
            None
        }
    }
}

/// Extract the concrete provider data a resource expects
pub fn downcast_provider_data<T: Any + Send + Sync>(
    data: &ProviderData,
    expected: &str,
    diags: &mut Diagnostics,
) -> Option<Arc<T>> {
    match Arc::clone(data).downcast::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            diags.add_error(
                "Unexpected Resource Configure Type",
                format!(
                    "Expected {}. Please report this issue to the provider developers.",
                    expected
                ),
            );
            None
        }
    }
}
