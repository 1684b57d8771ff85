//! LegoCharm API data types

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A user as returned by the LegoCharm API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserData {
    #[serde(default)]
    pub username: String,
    /// Canonical resource URL; the user id is its last path segment
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserData {
    /// Id of the user, derived from its resource URL
    pub fn id(&self) -> &str {
        super::last_path_segment(&self.url)
    }
}

/// Body for creating a new user
#[derive(Clone, Serialize)]
pub struct UserCreate {
    pub username: String,
    pub password: String,
    pub email: String,
    pub groups: Vec<String>,
}

impl fmt::Debug for UserCreate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCreate")
            .field("username", &self.username)
            .field("password", &"***")
            .field("email", &self.email)
            .field("groups", &self.groups)
            .finish()
    }
}

/// A domain registered with LegoCharm
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Domain {
    #[serde(default)]
    pub fqdn: String,
    #[serde(default)]
    pub id: i64,
}

/// Body for registering a domain
#[derive(Debug, Clone, Serialize)]
pub struct DomainCreate<'a> {
    pub fqdn: &'a str,
}

/// Scope of a domain access grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Access to the exact FQDN
    Domain,
    /// Access to the FQDN and every name below it
    Subdomain,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Domain => "domain",
            AccessLevel::Subdomain => "subdomain",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an access level outside `domain`/`subdomain`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid access level {0:?}, expected 'domain' or 'subdomain'")]
pub struct InvalidAccessLevel(pub String);

impl FromStr for AccessLevel {
    type Err = InvalidAccessLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "domain" => Ok(AccessLevel::Domain),
            "subdomain" => Ok(AccessLevel::Subdomain),
            other => Err(InvalidAccessLevel(other.to_string())),
        }
    }
}

/// Input for granting a user access to a domain, addressed by FQDN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAccessRequest {
    pub user_id: String,
    pub domain: String,
    pub access_level: AccessLevel,
}

/// Wire body for a new grant; the domain is referenced by its numeric id
#[derive(Debug, Clone, Serialize)]
pub struct DomainPermissionPayload {
    pub user: String,
    pub domain: i64,
    pub access_level: AccessLevel,
}

/// A user's access grant on a domain as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DomainUserPermission {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user: i64,
    #[serde(default)]
    pub domain: i64,
    #[serde(default)]
    pub access_level: String,
}

/// Lookup endpoints answer with a bare list, a paginated envelope, or a
/// single object depending on server version
#[derive(Debug)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    Page { results: Vec<T> },
    One(T),
}

// The shape is chosen from the JSON first. Any object carrying `results`
// is a page, so a bad page item is a decode error, never a single record.
impl<'de, T: DeserializeOwned> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match Value::deserialize(deserializer)? {
            Value::Array(items) => {
                serde_json::from_value(Value::Array(items)).map(OneOrMany::Many)
            }
            Value::Object(mut object) if object.contains_key("results") => {
                let results = object.remove("results").unwrap_or(Value::Null);
                serde_json::from_value(results).map(|results| OneOrMany::Page { results })
            }
            other => serde_json::from_value(other).map(OneOrMany::One),
        };
        parsed.map_err(de::Error::custom)
    }
}

impl<T> OneOrMany<T> {
    /// First record, if any
    pub(crate) fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(items) | OneOrMany::Page { results: items } => {
                items.into_iter().next()
            }
            OneOrMany::One(item) => Some(item),
        }
    }
}
