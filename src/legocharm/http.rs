//! HTTP utilities for LegoCharm REST API calls

use super::error::{ClientError, Result};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("legocharm-provider/", env!("CARGO_PKG_VERSION"));

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging and error messages.
/// Truncates long responses and strips control characters.
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Status and raw body of a completed request
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Fail with [`ClientError::Status`] unless the status is 2xx
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        tracing::error!("API error: {} - {}", self.status, sanitize_for_log(&self.body));
        Err(ClientError::Status {
            status: self.status,
            body: sanitize_for_log(&self.body),
        })
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self, what: &'static str) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|source| ClientError::Decode {
            what,
            body: sanitize_for_log(&self.body),
            source,
        })
    }
}

/// HTTP client wrapper that authenticates every request with basic auth
#[derive(Clone)]
pub struct LegoCharmHttp {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl fmt::Debug for LegoCharmHttp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegoCharmHttp")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl LegoCharmHttp {
    /// Create a new HTTP client. `base_url` must already be normalized.
    pub fn new(base_url: &str, username: &str, password: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Same connection pool, different credentials
    pub fn with_credentials(&self, username: &str, password: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build an authenticated request for an API path
    pub fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Dispatch a request and collect status and body
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::trace!("response status {}", status);
        Ok(ApiResponse { status, body })
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        tracing::debug!("GET {}", self.url(path));
        self.send(self.request(Method::GET, path)).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        tracing::debug!("POST {}", self.url(path));
        let body = serde_json::to_vec(body).map_err(ClientError::Encode)?;
        let request = self
            .request(Method::POST, path)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        tracing::debug!("DELETE {}", self.url(path));
        self.send(self.request(Method::DELETE, path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(200)));
        assert!(sanitized.contains("500 bytes total"));
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_for_log("bad\r\nrequest\t!"), "badrequest!");
    }

    #[test]
    fn test_sanitize_multibyte_boundary() {
        let body = format!("{}é{}", "a".repeat(199), "b".repeat(50));
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"a".repeat(199)));
        assert!(!sanitized.contains('é'));
    }

    #[test]
    fn test_url_join() {
        let http = LegoCharmHttp::new(
            "https://lego.example.com",
            "admin",
            "secret",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            http.url("/api/v1/users/"),
            "https://lego.example.com/api/v1/users/"
        );
        assert_eq!(http.url("api/v1/domains/"), "https://lego.example.com/api/v1/domains/");
    }

    #[test]
    fn test_request_sets_basic_auth() {
        let http = LegoCharmHttp::new(
            "https://lego.example.com",
            "user",
            "pass",
            Duration::from_secs(5),
        )
        .unwrap();
        let request = http.request(Method::GET, "/api/v1/thing").build().unwrap();
        let auth = request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .expect("Authorization header should be set");
        // base64("user:pass")
        assert_eq!(auth.to_str().unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_debug_hides_password() {
        let http = LegoCharmHttp::new(
            "https://lego.example.com",
            "user",
            "topsecret",
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(!format!("{:?}", http).contains("topsecret"));
        let other = http.with_credentials("bob", "alsosecret");
        assert_eq!(other.username(), "bob");
        assert_eq!(other.base_url(), "https://lego.example.com");
        assert!(!format!("{:?}", other).contains("alsosecret"));
    }
}
