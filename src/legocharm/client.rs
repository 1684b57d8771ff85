//! LegoCharm Client
//!
//! Typed helpers for every LegoCharm entity the provider manages, layered on
//! top of the authenticated HTTP wrapper.

use super::error::{ClientError, Result};
use super::http::{ApiResponse, LegoCharmHttp};
use super::models::{
    Domain, DomainAccessRequest, DomainCreate, DomainPermissionPayload, DomainUserPermission,
    OneOrMany, UserCreate, UserData,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default request timeout when `LEGOCHARM_API_TIMEOUT` is not set
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const USERS_PATH: &str = "/api/v1/users/";
const DOMAINS_PATH: &str = "/api/v1/domains/";
const DOMAIN_PERMISSIONS_PATH: &str = "/api/v1/domain-user-permissions/";

/// Main LegoCharm client
#[derive(Debug, Clone)]
pub struct LegoCharmClient {
    pub http: LegoCharmHttp,
    timeout: Duration,
}

/// Prepend `https://` when no scheme is given and trim trailing slashes
fn normalize_address(address: &str) -> Result<String> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    };

    let parsed = url::Url::parse(&candidate).map_err(|source| ClientError::InvalidAddress {
        address: address.to_string(),
        source,
    })?;
    if !parsed.has_host() {
        return Err(ClientError::InvalidAddress {
            address: address.to_string(),
            source: url::ParseError::EmptyHost,
        });
    }

    Ok(candidate.trim_end_matches('/').to_string())
}

impl LegoCharmClient {
    /// Create a new LegoCharm client
    pub fn new(address: &str, username: &str, password: &str, timeout: Duration) -> Result<Self> {
        if address.is_empty() {
            return Err(ClientError::MissingSetting("address"));
        }
        if username.is_empty() {
            return Err(ClientError::MissingSetting("username"));
        }
        if password.is_empty() {
            return Err(ClientError::MissingSetting("password"));
        }

        let base_url = normalize_address(address)?;
        let http = LegoCharmHttp::new(&base_url, username, password, timeout)?;
        tracing::debug!("LegoCharm client for {} as {}", base_url, username);

        Ok(Self { http, timeout })
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Fetch a user by id
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<UserData> {
        let path = format!("{}{}/", USERS_PATH, urlencoding::encode(user_id));
        let response = self.http.get(&path).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        response.error_for_status()?.json("user")
    }

    /// Fetch the first user whose username matches
    pub async fn get_user_by_username(&self, username: &str) -> Result<UserData> {
        let path = format!("{}?username={}", USERS_PATH, urlencoding::encode(username));
        let response = self.http.get(&path).await?;
        first_match(response, "user")
    }

    /// Create a new user
    pub async fn create_user(&self, user: &UserCreate) -> Result<UserData> {
        tracing::info!("Creating user {}", user.username);
        let response = self.http.post(USERS_PATH, user).await?;
        response.error_for_status()?.json("user")
    }

    /// Delete a user by id. A user that is already gone counts as deleted.
    pub async fn delete_user_by_id(&self, user_id: &str) -> Result<()> {
        tracing::info!("Deleting user {}", user_id);
        let path = format!("{}{}/", USERS_PATH, urlencoding::encode(user_id));
        let response = self.http.delete(&path).await?;
        accept_deleted(response)
    }

    /// Check whether `username`/`password` still authenticate.
    ///
    /// A 401 means the password was rejected; a 403 means the credentials were
    /// accepted but the user may not list users.
    pub async fn has_valid_user_password(&self, username: &str, password: &str) -> Result<bool> {
        let user_http = self.http.with_credentials(username, password);
        let path = format!("{}?username={}", USERS_PATH, urlencoding::encode(username));
        let response = user_http.get(&path).await?;

        match response.status {
            StatusCode::UNAUTHORIZED => Ok(false),
            StatusCode::FORBIDDEN => Ok(true),
            status if status.is_success() => Ok(true),
            status => Err(ClientError::UnexpectedProbeStatus(status)),
        }
    }

    // =========================================================================
    // Domains
    // =========================================================================

    /// Fetch a domain by FQDN
    pub async fn get_domain(&self, fqdn: &str) -> Result<Domain> {
        let path = format!("{}?fqdn={}", DOMAINS_PATH, urlencoding::encode(fqdn));
        let response = self.http.get(&path).await?;
        first_match(response, "domain")
    }

    /// Register a domain
    pub async fn create_domain(&self, fqdn: &str) -> Result<Domain> {
        tracing::info!("Creating domain {}", fqdn);
        let response = self.http.post(DOMAINS_PATH, &DomainCreate { fqdn }).await?;
        response.error_for_status()?.json("domain")
    }

    // =========================================================================
    // Domain access grants
    // =========================================================================

    /// Fetch the grant for a user on a domain
    pub async fn get_domain_access(
        &self,
        user_id: &str,
        fqdn: &str,
    ) -> Result<DomainUserPermission> {
        let user = self.get_user_by_id(user_id).await?;

        let path = format!(
            "{}?username={}&fqdn={}",
            DOMAIN_PERMISSIONS_PATH,
            urlencoding::encode(&user.username),
            urlencoding::encode(fqdn)
        );
        let response = self.http.get(&path).await?;
        first_match(response, "domain access")
    }

    /// Grant a user access to a domain, registering the domain first if
    /// LegoCharm does not know it yet
    pub async fn create_domain_access(
        &self,
        access: &DomainAccessRequest,
    ) -> Result<DomainUserPermission> {
        let domain = match self.get_domain(&access.domain).await {
            Ok(domain) => domain,
            Err(ClientError::NotFound) => self.create_domain(&access.domain).await?,
            Err(e) => return Err(e),
        };

        let payload = DomainPermissionPayload {
            user: access.user_id.clone(),
            domain: domain.id,
            access_level: access.access_level,
        };

        tracing::info!(
            "Granting user {} {} access on {} (domain id {})",
            access.user_id,
            access.access_level,
            access.domain,
            domain.id
        );
        let response = self.http.post(DOMAIN_PERMISSIONS_PATH, &payload).await?;
        response.error_for_status()?.json("domain access")
    }

    /// Revoke a grant by its database id
    pub async fn delete_domain_access(&self, id: i64) -> Result<()> {
        tracing::info!("Deleting domain access {}", id);
        let path = format!("{}{}/", DOMAIN_PERMISSIONS_PATH, id);
        let response = self.http.delete(&path).await?;
        accept_deleted(response)
    }
}

/// Decode a lookup response and return its first record
fn first_match<T: DeserializeOwned>(response: ApiResponse, what: &'static str) -> Result<T> {
    if response.status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound);
    }
    let response = response.error_for_status()?;
    response
        .json::<OneOrMany<T>>(what)?
        .into_first()
        .ok_or(ClientError::NotFound)
}

fn accept_deleted(response: ApiResponse) -> Result<()> {
    if response.status == StatusCode::NOT_FOUND {
        tracing::debug!("Already deleted");
        return Ok(());
    }
    response.error_for_status().map(|_| ())
}
