//! # Management API Client
//!
//! Thin `reqwest` wrapper over the management service's REST API.
//!
//! Error mapping:
//! - request could not be sent: `BackendUnreachable`
//! - 401/403: `BackendAuth`
//! - any other non-2xx: `BackendRejected`

use crate::error::DeployError;
use crate::settings::StackType;
use crate::store::ManagementCredentials;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint id used when the API lists none.
pub const DEFAULT_ENDPOINT_ID: u64 = 1;

/// Cluster id used when the API does not report one.
pub const DEFAULT_SWARM_ID: &str = "local";

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Login<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    jwt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Endpoint {
    id: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SwarmInfo {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateStack<'a> {
    name: &'a str,
    stack_file_content: &'a str,
    env: Vec<serde_json::Value>,
    #[serde(rename = "SwarmID", skip_serializing_if = "Option::is_none")]
    swarm_id: Option<&'a str>,
}

// =============================================================================
// CLIENT
// =============================================================================

fn is_loopback(url: &str) -> bool {
    let host = url.split_once("://").map_or(url, |(_, rest)| rest);
    ["localhost", "127.", "[::1]"]
        .iter()
        .any(|prefix| host.starts_with(prefix))
}

#[derive(Debug, Clone)]
pub struct ManagementClient {
    http: reqwest::Client,
    base_url: String,
}

impl ManagementClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DeployError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        // A loopback API is never reached through a proxy.
        if is_loopback(&base_url) {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| DeployError::BackendUnreachable(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, DeployError> {
        req.send()
            .await
            .map_err(|e| DeployError::BackendUnreachable(format!("{}: {e}", self.base_url)))
    }

    async fn check(resp: Response) -> Result<Response, DeployError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DeployError::BackendAuth(format!("{status}: {body}")));
        }
        Err(DeployError::BackendRejected {
            status: status.as_u16(),
            detail: body,
        })
    }

    async fn json<T: DeserializeOwned>(resp: Response) -> Result<T, DeployError> {
        let status = resp.status().as_u16();
        resp.json::<T>()
            .await
            .map_err(|e| DeployError::BackendRejected {
                status,
                detail: format!("unexpected response body: {e}"),
            })
    }

    /// GET /api/status
    pub async fn status(&self) -> Result<(), DeployError> {
        let resp = self.send(self.request(Method::GET, "/api/status", None)).await?;
        Self::check(resp).await.map(drop)
    }

    /// Probe `status` until it answers or `attempts` run out.
    pub async fn wait_until_up(&self, attempts: u32, delay: Duration) -> Result<(), DeployError> {
        let mut last = DeployError::BackendUnreachable(self.base_url.clone());
        for attempt in 1..=attempts.max(1) {
            match self.status().await {
                Ok(()) => {
                    info!(attempt, "Management API is up");
                    return Ok(());
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Management API not up yet");
                    last = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        Err(last)
    }

    /// POST /api/users/admin/init. An already initialized admin (409) is
    /// not an error.
    pub async fn init_admin(&self, credentials: &ManagementCredentials) -> Result<(), DeployError> {
        let body = Login {
            username: &credentials.username,
            password: &credentials.password,
        };
        let resp = self
            .send(self.request(Method::POST, "/api/users/admin/init", None).json(&body))
            .await?;
        if resp.status() == StatusCode::CONFLICT {
            debug!("Admin account already initialized");
            return Ok(());
        }
        Self::check(resp).await.map(drop)
    }

    /// POST /api/auth, returning the bearer token.
    pub async fn authenticate(
        &self,
        credentials: &ManagementCredentials,
    ) -> Result<String, DeployError> {
        let body = Login {
            username: &credentials.username,
            password: &credentials.password,
        };
        let resp = self
            .send(self.request(Method::POST, "/api/auth", None).json(&body))
            .await?;
        let auth: AuthResponse = Self::json(Self::check(resp).await?).await?;
        Ok(auth.jwt)
    }

    /// GET /api/endpoints, first id or [`DEFAULT_ENDPOINT_ID`].
    pub async fn endpoint_id(&self, token: &str) -> Result<u64, DeployError> {
        let resp = self
            .send(self.request(Method::GET, "/api/endpoints", Some(token)))
            .await?;
        let endpoints: Vec<Endpoint> = Self::json(Self::check(resp).await?).await?;
        Ok(endpoints.first().map_or(DEFAULT_ENDPOINT_ID, |e| e.id))
    }

    /// GET /api/swarm, cluster id or [`DEFAULT_SWARM_ID`].
    pub async fn swarm_id(&self, token: &str) -> Result<String, DeployError> {
        let resp = self
            .send(self.request(Method::GET, "/api/swarm", Some(token)))
            .await?;
        let info: SwarmInfo = Self::json(Self::check(resp).await?).await?;
        Ok(info
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_SWARM_ID.to_string()))
    }

    /// POST /api/stacks?type=..&method=string&endpointId=..
    pub async fn create_stack(
        &self,
        token: &str,
        stack_type: StackType,
        endpoint_id: u64,
        swarm_id: Option<&str>,
        name: &str,
        content: &str,
    ) -> Result<(), DeployError> {
        let path = format!(
            "/api/stacks?type={}&method=string&endpointId={}",
            stack_type.api_code(),
            endpoint_id
        );
        let body = CreateStack {
            name,
            stack_file_content: content,
            env: Vec::new(),
            swarm_id,
        };
        let resp = self
            .send(self.request(Method::POST, &path, Some(token)).json(&body))
            .await?;
        Self::check(resp).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_body_uses_pascal_case() {
        let body = CreateStack {
            name: "grafana",
            stack_file_content: "version: '3.8'",
            env: Vec::new(),
            swarm_id: Some("abc"),
        };
        let json = serde_json::to_value(&body).expect("json");
        assert_eq!(json["Name"], "grafana");
        assert_eq!(json["StackFileContent"], "version: '3.8'");
        assert_eq!(json["SwarmID"], "abc");
        assert!(json["Env"].as_array().is_some_and(Vec::is_empty));
    }

    #[test]
    fn standalone_body_omits_swarm_id() {
        let body = CreateStack {
            name: "grafana",
            stack_file_content: "",
            env: Vec::new(),
            swarm_id: None,
        };
        let json = serde_json::to_value(&body).expect("json");
        assert!(json.get("SwarmID").is_none());
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback("http://localhost:9000"));
        assert!(is_loopback("http://127.0.0.1:9000"));
        assert!(!is_loopback("https://portainer.example.com"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = ManagementClient::new("http://localhost:9000/").expect("client");
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_unreachable() {
        let client = ManagementClient::new("http://127.0.0.1:1").expect("client");
        let err = client.status().await.expect_err("nothing listens on port 1");
        assert!(matches!(err, DeployError::BackendUnreachable(_)));
    }
}
