//! Provider host
//!
//! Registers a provider's resources under their full type names, configures
//! them, and drives the plan/apply/read/import/delete lifecycle the way the
//! orchestration tool does.

use super::diagnostics::Diagnostics;
use super::provider::{EnvLookup, Provider, ProviderMetadata};
use super::resource::{Resource, ResourceResponse};
use super::schema::{PlanModifier, Schema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    Update,
    Replace,
    Delete,
    NoOp,
}

/// Planned change for one resource instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub action: PlanAction,
    /// Attributes whose change forces replacement
    #[serde(default)]
    pub requires_replace: Vec<String>,
    pub planned_state: Option<Value>,
}

pub struct ProviderHost {
    provider: Box<dyn Provider>,
    metadata: ProviderMetadata,
    resources: BTreeMap<String, Box<dyn Resource>>,
}

impl ProviderHost {
    pub fn new<P: Provider + 'static>(provider: P) -> Self {
        let metadata = provider.metadata();
        let resources = provider
            .resources()
            .into_iter()
            .map(|factory| {
                let resource = factory();
                (resource.type_name(&metadata.type_name), resource)
            })
            .collect();

        Self {
            provider: Box::new(provider),
            metadata,
            resources,
        }
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Registered resource type names
    pub fn resource_types(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    pub fn schema(&self, type_name: &str) -> Option<Schema> {
        self.resources.get(type_name).map(|r| r.schema())
    }

    /// Configure the provider and hand its data to every resource
    pub fn configure(&mut self, config: &Value, env: EnvLookup<'_>) -> Diagnostics {
        let (data, mut diags) = self.provider.configure(config, env);
        if diags.has_error() {
            return diags;
        }
        for resource in self.resources.values_mut() {
            resource.configure(data.as_ref(), &mut diags);
        }
        tracing::info!(
            "Configured provider {} {}",
            self.metadata.type_name,
            self.metadata.version
        );
        diags
    }

    fn resource(&self, type_name: &str) -> Result<&dyn Resource, Diagnostics> {
        match self.resources.get(type_name) {
            Some(resource) => Ok(resource.as_ref()),
            None => {
                let mut diags = Diagnostics::new();
                diags.add_error(
                    "Unknown Resource Type",
                    format!(
                        "The provider does not support resource type {:?}. Supported types: {}",
                        type_name,
                        self.resource_types().join(", ")
                    ),
                );
                Err(diags)
            }
        }
    }

    /// Compare prior state with desired configuration.
    ///
    /// `config == None` means the resource was removed from configuration.
    pub fn plan(
        &self,
        type_name: &str,
        prior: Option<&Value>,
        config: Option<&Value>,
    ) -> Result<Plan, Diagnostics> {
        let resource = self.resource(type_name)?;
        let schema = resource.schema();
        let prior = prior.filter(|v| !v.is_null());
        let config = config.filter(|v| !v.is_null());

        let Some(config) = config else {
            let action = if prior.is_some() {
                PlanAction::Delete
            } else {
                PlanAction::NoOp
            };
            return Ok(Plan {
                action,
                requires_replace: Vec::new(),
                planned_state: None,
            });
        };

        let planned = plan_configurable(&schema, config)?;
        let plan = match prior {
            None => Plan {
                action: PlanAction::Create,
                requires_replace: Vec::new(),
                planned_state: Some(Value::Object(with_computed(&schema, planned, None))),
            },
            Some(prior) => {
                let requires_replace: Vec<String> = schema
                    .configurable()
                    .filter(|(_, a)| a.has_modifier(PlanModifier::RequiresReplace))
                    .filter(|(name, _)| planned.get(name.as_str()) != Some(attr(prior, name)))
                    .map(|(name, _)| name.clone())
                    .collect();

                if !requires_replace.is_empty() {
                    Plan {
                        action: PlanAction::Replace,
                        requires_replace,
                        planned_state: Some(Value::Object(with_computed(&schema, planned, None))),
                    }
                } else {
                    let changed = planned
                        .iter()
                        .any(|(name, value)| value != attr(prior, name));
                    let action = if changed {
                        PlanAction::Update
                    } else {
                        PlanAction::NoOp
                    };
                    Plan {
                        action,
                        requires_replace,
                        planned_state: Some(Value::Object(with_computed(
                            &schema,
                            planned,
                            Some(prior),
                        ))),
                    }
                }
            }
        };

        tracing::debug!("Planned {:?} for {}", plan.action, type_name);
        Ok(plan)
    }

    /// Carry out a plan
    pub async fn apply(
        &self,
        type_name: &str,
        prior: Option<Value>,
        plan: &Plan,
    ) -> ResourceResponse {
        let resource = match self.resource(type_name) {
            Ok(resource) => resource,
            Err(diags) => return ResourceResponse::new(prior, diags),
        };
        tracing::info!("Applying {:?} to {}", plan.action, type_name);

        let prior = prior.filter(|v| !v.is_null());
        let planned = plan.planned_state.clone();

        match (plan.action, prior, planned) {
            (PlanAction::NoOp, prior, _) => ResourceResponse::new(prior, Diagnostics::new()),
            (PlanAction::Create, _, Some(planned)) => resource.create(planned).await,
            (PlanAction::Update, Some(prior), Some(planned)) => {
                resource.update(prior, planned).await
            }
            (PlanAction::Replace, Some(prior), Some(planned)) => {
                let mut diags = resource.delete(prior.clone()).await;
                if diags.has_error() {
                    return ResourceResponse::new(Some(prior), diags);
                }
                let mut response = resource.create(planned).await;
                diags.extend(response.diagnostics);
                response.diagnostics = diags;
                response
            }
            (PlanAction::Delete, Some(prior), _) => {
                let diags = resource.delete(prior.clone()).await;
                if diags.has_error() {
                    ResourceResponse::new(Some(prior), diags)
                } else {
                    ResourceResponse::removed(diags)
                }
            }
            (action, prior, _) => {
                let mut diags = Diagnostics::new();
                diags.add_error(
                    "Invalid Plan",
                    format!(
                        "A {:?} plan requires {}.",
                        action,
                        match action {
                            PlanAction::Create => "a planned state",
                            PlanAction::Delete => "a prior state",
                            _ => "both a prior and a planned state",
                        }
                    ),
                );
                ResourceResponse::new(prior, diags)
            }
        }
    }

    /// Refresh state from the remote service
    pub async fn read(&self, type_name: &str, state: Value) -> ResourceResponse {
        match self.resource(type_name) {
            Ok(resource) => resource.read(state).await,
            Err(diags) => ResourceResponse::new(Some(state), diags),
        }
    }

    /// Import an existing remote entity, then refresh it
    pub async fn import(&self, type_name: &str, id: &str) -> ResourceResponse {
        let resource = match self.resource(type_name) {
            Ok(resource) => resource,
            Err(diags) => return ResourceResponse::removed(diags),
        };

        let imported = resource.import_state(id).await;
        let Some(state) = imported.state.filter(|_| !imported.diagnostics.has_error()) else {
            return ResourceResponse::removed(imported.diagnostics);
        };

        let mut diags = imported.diagnostics;
        let mut response = resource.read(state).await;
        if response.state.is_none() && !response.diagnostics.has_error() {
            response.diagnostics.add_error(
                "Cannot Import Non-Existent Remote Object",
                format!("No remote object matches import id {:?}.", id),
            );
        }
        diags.extend(response.diagnostics);
        response.diagnostics = diags;
        response
    }

    pub async fn delete(&self, type_name: &str, state: Value) -> Diagnostics {
        match self.resource(type_name) {
            Ok(resource) => resource.delete(state).await,
            Err(diags) => diags,
        }
    }
}

fn attr<'a>(object: &'a Value, name: &str) -> &'a Value {
    object.get(name).unwrap_or(&Value::Null)
}

/// Configured attributes of the desired state, validated against the schema
fn plan_configurable(schema: &Schema, config: &Value) -> Result<Map<String, Value>, Diagnostics> {
    let mut diags = Diagnostics::new();
    let Some(object) = config.as_object() else {
        diags.add_error("Invalid Configuration", "Resource configuration must be an object.");
        return Err(diags);
    };

    for name in object.keys() {
        match schema.attribute(name) {
            Some(a) if a.required || a.optional => {}
            Some(_) => diags.add_attribute_error(
                name,
                "Invalid Configuration for Read-Only Attribute",
                format!("{:?} is computed by the provider and cannot be set.", name),
            ),
            None => diags.add_attribute_error(
                name,
                "Unsupported Argument",
                format!("An argument named {:?} is not expected here.", name),
            ),
        }
    }
    for name in schema.missing_required(config) {
        diags.add_attribute_error(
            &name,
            "Missing Required Attribute",
            format!("The argument {:?} is required, but no definition was found.", name),
        );
    }
    if diags.has_error() {
        return Err(diags);
    }

    Ok(schema
        .configurable()
        .map(|(name, _)| (name.clone(), attr(config, name).clone()))
        .collect())
}

/// Fill computed attributes: carried from prior state where allowed,
/// otherwise left null for the provider to set
fn with_computed(
    schema: &Schema,
    mut planned: Map<String, Value>,
    prior: Option<&Value>,
) -> Map<String, Value> {
    for (name, attribute) in schema.computed_only() {
        let value = match prior {
            Some(prior) if attribute.has_modifier(PlanModifier::UseStateForUnknown) => {
                attr(prior, name).clone()
            }
            _ => Value::Null,
        };
        planned.insert(name.clone(), value);
    }
    planned
}
