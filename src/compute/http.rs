//! Compute Engine REST transport
//!
//! Implements [`ComputeApi`] over the Compute Engine v1 JSON API with
//! `reqwest`. Credentials are passed in as a ready-made OAuth2 access token.

use crate::domain::ports::{ComputeApi, Operation, SslCertificate};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Public Compute Engine v1 endpoint
pub const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Compute Engine client
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    /// API base URL, up to and including the version segment
    pub endpoint: String,
    /// Project every request is scoped to
    pub project_id: String,
    /// OAuth2 bearer token; requests are sent unauthenticated without one
    pub access_token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project_id: String::new(),
            access_token: None,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SslCertificateList {
    #[serde(default)]
    items: Vec<SslCertificate>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

// =============================================================================
// Compute Client
// =============================================================================

/// HTTP client for the global SslCertificate and operation endpoints
#[derive(Clone)]
pub struct ComputeClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl std::fmt::Debug for ComputeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeClient")
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ComputeClient {
    /// Create a new client
    pub fn new(config: &ComputeConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(Error::Configuration("Compute endpoint is empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn url(&self, project: &str, collection: &str, name: Option<&str>) -> String {
        let mut url = format!(
            "{}/projects/{}/global/{}",
            self.endpoint,
            urlencoding::encode(project),
            collection
        );
        if let Some(name) = name {
            url.push('/');
            url.push_str(&urlencoding::encode(name));
        }
        url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode the body, mapping 404 to not-found
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        kind: &str,
        name: &str,
    ) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(kind, name));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GoogleErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);

        Err(Error::ComputeApi {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ComputeApi for ComputeClient {
    async fn insert_ssl_certificate(
        &self,
        project: &str,
        certificate: &SslCertificate,
    ) -> Result<Operation> {
        let url = self.url(project, "sslCertificates", None);
        debug!("POST {}", url);
        let request = self.request(Method::POST, &url).json(certificate);
        self.send(request, "SslCertificate", &certificate.name).await
    }

    async fn delete_ssl_certificate(&self, project: &str, name: &str) -> Result<Operation> {
        let url = self.url(project, "sslCertificates", Some(name));
        debug!("DELETE {}", url);
        self.send(self.request(Method::DELETE, &url), "SslCertificate", name)
            .await
    }

    async fn get_ssl_certificate(&self, project: &str, name: &str) -> Result<SslCertificate> {
        let url = self.url(project, "sslCertificates", Some(name));
        debug!("GET {}", url);
        self.send(self.request(Method::GET, &url), "SslCertificate", name)
            .await
    }

    async fn list_ssl_certificates(&self, project: &str) -> Result<Vec<SslCertificate>> {
        let url = self.url(project, "sslCertificates", None);
        let mut certificates = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            debug!("GET {} (page token: {:?})", url, page_token);
            let mut request = self.request(Method::GET, &url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: SslCertificateList = self.send(request, "Project", project).await?;
            certificates.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(certificates),
            }
        }
    }

    async fn get_global_operation(&self, project: &str, name: &str) -> Result<Operation> {
        let url = self.url(project, "operations", Some(name));
        self.send(self.request(Method::GET, &url), "Operation", name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::OperationStatus;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "/projects/test-project/global";

    fn client(server: &MockServer) -> ComputeClient {
        ComputeClient::new(&ComputeConfig {
            endpoint: server.uri(),
            project_id: "test-project".into(),
            access_token: Some("test-token".into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ComputeConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("managed-certs/"));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let config = ComputeConfig {
            endpoint: String::new(),
            ..Default::default()
        };
        assert_matches!(ComputeClient::new(&config), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = ComputeClient::new(&ComputeConfig {
            access_token: Some("secret-token".into()),
            ..Default::default()
        })
        .unwrap();

        let debug = format!("{:?}", client);
        assert!(debug.contains(DEFAULT_ENDPOINT));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }

    #[tokio::test]
    async fn test_insert_sends_managed_certificate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/sslCertificates")))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "name": "example-cert",
                "type": "MANAGED",
                "managed": {"domains": ["a.example.com", "b.example.com"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-1",
                "status": "PENDING",
                "operationType": "insert"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cert = SslCertificate::managed(
            "example-cert",
            vec!["a.example.com".into(), "b.example.com".into()],
        );
        let operation = client(&server)
            .insert_ssl_certificate("test-project", &cert)
            .await
            .unwrap();

        assert_eq!(operation.name, "operation-1");
        assert_eq!(operation.status, OperationStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_missing_certificate_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/sslCertificates/missing-cert")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "The resource 'missing-cert' was not found"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_ssl_certificate("test-project", "missing-cert")
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_matches!(err, Error::ResourceNotFound { ref kind, .. } if kind == "SslCertificate");
    }

    #[tokio::test]
    async fn test_server_error_carries_google_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{BASE}/sslCertificates/busy-cert")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "The ssl_certificate resource is in use"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .delete_ssl_certificate("test-project", "busy-cert")
            .await
            .unwrap_err();

        assert_matches!(err, Error::ComputeApi { status: 400, ref message }
            if message == "The ssl_certificate resource is in use");
    }

    #[tokio::test]
    async fn test_list_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/sslCertificates")))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "cert-c", "type": "MANAGED"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/sslCertificates")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "cert-a"}, {"name": "cert-b"}],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;

        let names: Vec<String> = client(&server)
            .list_ssl_certificates("test-project")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();

        assert_eq!(names, vec!["cert-a", "cert-b", "cert-c"]);
    }

    #[tokio::test]
    async fn test_get_operation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/operations/operation-1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-1",
                "status": "DONE",
                "progress": 100,
                "error": {"errors": [{"code": "QUOTA_EXCEEDED", "message": "Quota exceeded"}]}
            })))
            .mount(&server)
            .await;

        let operation = client(&server)
            .get_global_operation("test-project", "operation-1")
            .await
            .unwrap();

        assert!(operation.status.is_terminal());
        assert_eq!(operation.progress, Some(100));
        assert_eq!(operation.errors()[0].code, "QUOTA_EXCEEDED");
    }
}
