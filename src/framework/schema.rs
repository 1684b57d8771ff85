//! Resource schema declarations

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Int64,
}

/// How planning treats changes to an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModifier {
    /// Any change destroys and recreates the resource
    RequiresReplace,
    /// Computed value is carried over from prior state instead of becoming unknown
    UseStateForUnknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub kind: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub plan_modifiers: Vec<PlanModifier>,
}

impl Attribute {
    fn new(kind: AttributeType) -> Self {
        Self {
            kind,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            plan_modifiers: Vec::new(),
        }
    }

    pub fn required_string() -> Self {
        Self {
            required: true,
            ..Self::new(AttributeType::String)
        }
    }

    pub fn optional_string() -> Self {
        Self {
            optional: true,
            ..Self::new(AttributeType::String)
        }
    }

    pub fn computed_string() -> Self {
        Self {
            computed: true,
            ..Self::new(AttributeType::String)
        }
    }

    pub fn computed_int64() -> Self {
        Self {
            computed: true,
            ..Self::new(AttributeType::Int64)
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::RequiresReplace);
        self
    }

    pub fn use_state_for_unknown(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::UseStateForUnknown);
        self
    }

    pub fn has_modifier(&self, modifier: PlanModifier) -> bool {
        self.plan_modifiers.contains(&modifier)
    }
}

/// Attribute layout of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub description: String,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Attributes the user sets in configuration
    pub fn configurable(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes
            .iter()
            .filter(|(_, a)| a.required || a.optional)
    }

    /// Attributes only the provider sets
    pub fn computed_only(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes
            .iter()
            .filter(|(_, a)| a.computed && !a.required && !a.optional)
    }

    /// Required attributes missing from a configuration object
    pub fn missing_required(&self, config: &serde_json::Value) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, a)| a.required)
            .filter(|(name, _)| config.get(name.as_str()).map_or(true, |v| v.is_null()))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
