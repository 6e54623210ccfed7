//! GitLab REST transport.

use std::time::Duration;

use async_trait::async_trait;
use labkit_core::{ApiClient, Credential, QueryParams, TransportError};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{GitLabErrorBody, GitLabObject};

/// First retry waits this long; each further retry doubles it.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Response header carrying the next page number.
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// How transient (5xx-class) failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Attempts after the first one
    pub max_retries: u32,
}

impl RetryPolicy {
    fn delay(attempt: u32) -> Duration {
        RETRY_BASE_DELAY * 2u32.saturating_pow(attempt.min(16))
    }
}

/// GitLab API client handle.
///
/// Built by [`ConnectionFactory`](crate::ConnectionFactory). Holds no mutable
/// state; each call is an independent sequence of requests.
pub struct GitLabClient {
    base_url: String,
    api_version: u32,
    credential: Credential,
    per_page: u32,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl GitLabClient {
    pub(crate) fn from_parts(
        base_url: &str,
        api_version: u32,
        credential: Credential,
        per_page: u32,
        retry: RetryPolicy,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version,
            credential,
            per_page,
            retry,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Get the API URL for a collection path like `projects/42/issues`.
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v{}/{}",
            self.base_url,
            self.api_version,
            path.trim_matches('/')
        )
    }

    /// Build request with the credential header.
    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(url);
        match auth_header(&self.credential) {
            Some((name, value)) => builder.header(name, value),
            None => builder,
        }
    }

    /// Send a GET, retrying transient failures when the policy allows it.
    async fn send(
        &self,
        operation: &str,
        url: &str,
        query: &[(String, String)],
    ) -> Result<reqwest::Response, TransportError> {
        let mut attempt = 0;

        loop {
            debug!(url = url, attempt = attempt, "GitLab GET request");

            let response = self
                .request(url)
                .query(query)
                .send()
                .await
                .map_err(|e| TransportError::new(operation, e.to_string()))?;

            if response.status().is_success() {
                return Ok(response);
            }

            let error = error_from_response(operation, response).await;
            if !(self.retry.enabled && error.is_transient() && attempt < self.retry.max_retries) {
                return Err(error);
            }

            let delay = RetryPolicy::delay(attempt);
            debug!(
                status = ?error.status,
                attempt = attempt + 1,
                max_retries = self.retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Retrying transient GitLab error"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Header carrying the selected credential, if any.
fn auth_header(credential: &Credential) -> Option<(&'static str, String)> {
    match credential {
        Credential::Private(token) => Some(("PRIVATE-TOKEN", token.clone())),
        Credential::OAuth(token) => Some(("Authorization", format!("Bearer {}", token))),
        Credential::Job(token) => Some(("JOB-TOKEN", token.clone())),
        Credential::Anonymous => None,
    }
}

/// Map a non-2xx response to a transport error.
async fn error_from_response(operation: &str, response: reqwest::Response) -> TransportError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();

    warn!(
        status = status.as_u16(),
        error = %message,
        "GitLab API error response"
    );

    TransportError::from_status(operation, status.as_u16(), status.canonical_reason(), message)
}

fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<GitLabErrorBody>(trimmed) {
        Ok(parsed) => parsed.message().or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}

fn next_page(response: &reqwest::Response) -> Option<u32> {
    response
        .headers()
        .get(NEXT_PAGE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse().ok())
}

async fn parse_json<T: DeserializeOwned>(
    operation: &str,
    response: reqwest::Response,
) -> Result<T, TransportError> {
    response
        .json()
        .await
        .map_err(|e| TransportError::new(operation, format!("Failed to parse response: {}", e)))
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl ApiClient for GitLabClient {
    type Object = GitLabObject;

    /// Drains every page unless the caller pinned one with a `page` filter.
    async fn list(
        &self,
        path: &str,
        params: &QueryParams,
    ) -> Result<Vec<GitLabObject>, TransportError> {
        let url = self.api_url(path);
        let operation = format!("GET /{}", path.trim_matches('/'));

        let mut query = params.to_query_pairs();
        if !params.contains_key("per_page") {
            query.push(("per_page".to_string(), self.per_page.to_string()));
        }

        let single_page = params.contains_key("page");
        let mut page: u32 = 1;
        let mut objects = Vec::new();

        loop {
            let mut page_query = query.clone();
            if !single_page {
                page_query.push(("page".to_string(), page.to_string()));
            }

            let response = self.send(&operation, &url, &page_query).await?;
            let next = next_page(&response);
            let batch: Vec<GitLabObject> = parse_json(&operation, response).await?;

            debug!(
                path = path,
                page = page,
                count = batch.len(),
                "GitLab page received"
            );
            objects.extend(batch);

            match next {
                Some(next) if !single_page && next > page => page = next,
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn get(&self, path: &str, id: u64) -> Result<GitLabObject, TransportError> {
        let path = format!("{}/{}", path.trim_matches('/'), id);
        let url = self.api_url(&path);
        let operation = format!("GET /{}", path);

        let response = self.send(&operation, &url, &[]).await?;
        parse_json(&operation, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionFactory;
    use labkit_core::ConnectionParams;

    #[test]
    fn test_auth_header() {
        assert_eq!(
            auth_header(&Credential::Private("glpat".to_string())),
            Some(("PRIVATE-TOKEN", "glpat".to_string()))
        );
        assert_eq!(
            auth_header(&Credential::OAuth("oauth".to_string())),
            Some(("Authorization", "Bearer oauth".to_string()))
        );
        assert_eq!(
            auth_header(&Credential::Job("ci".to_string())),
            Some(("JOB-TOKEN", "ci".to_string()))
        );
        assert_eq!(auth_header(&Credential::Anonymous), None);
    }

    #[test]
    fn test_api_url() {
        let client =
            ConnectionFactory::build(&ConnectionParams::new("https://gitlab.example.com/"))
                .unwrap();
        assert_eq!(
            client.api_url("projects"),
            "https://gitlab.example.com/api/v4/projects"
        );
        assert_eq!(
            client.api_url("/projects/42/issues/"),
            "https://gitlab.example.com/api/v4/projects/42/issues"
        );
    }

    #[test]
    fn test_retry_delay_doubles() {
        assert_eq!(RetryPolicy::delay(0), Duration::from_millis(100));
        assert_eq!(RetryPolicy::delay(1), Duration::from_millis(200));
        assert_eq!(RetryPolicy::delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"message":"404 Project Not Found"}"#),
            Some("404 Project Not Found".to_string())
        );
        assert_eq!(
            error_message(r#"{"message":{"name":["has already been taken"]}}"#),
            Some(r#"{"name":["has already been taken"]}"#.to_string())
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_token","error_description":"Token expired"}"#),
            Some("invalid_token: Token expired".to_string())
        );
        assert_eq!(
            error_message("<html>Bad Gateway</html>"),
            Some("<html>Bad Gateway</html>".to_string())
        );
        assert_eq!(error_message("  "), None);
    }

    // =========================================================================
    // Integration tests with httpmock
    // =========================================================================

    mod integration {
        use super::*;
        use httpmock::prelude::*;
        use labkit_core::{AccessError, CollectionAccessor, Locator, RawObject, ResolutionError};
        use serde_json::{json, Value};

        fn params(server: &MockServer) -> ConnectionParams {
            ConnectionParams {
                private_token: Some("test-token".to_string()),
                ..ConnectionParams::new(server.base_url())
            }
        }

        fn create_test_client(server: &MockServer) -> GitLabClient {
            ConnectionFactory::build(&params(server)).unwrap()
        }

        fn ids(objects: &[GitLabObject]) -> Vec<u64> {
            objects
                .iter()
                .filter_map(|o| o.attributes().get("id").and_then(Value::as_u64))
                .collect()
        }

        #[tokio::test]
        async fn test_get_by_id() {
            let server = MockServer::start_async().await;

            let mock = server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/api/v4/projects/42")
                        .header("PRIVATE-TOKEN", "test-token");
                    then.status(200).json_body(json!({
                        "id": 42,
                        "name": "my-app",
                        "path_with_namespace": "group/my-app",
                        "visibility": "private"
                    }));
                })
                .await;

            let client = create_test_client(&server);
            let project = client.get("projects", 42).await.unwrap();
            let attributes = project.attributes();

            mock.assert_async().await;
            let keys: Vec<&str> = attributes.keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["id", "name", "path_with_namespace", "visibility"]);
            assert_eq!(project.id(), Some(42));
        }

        #[tokio::test]
        async fn test_list_drains_pages_in_order() {
            let server = MockServer::start_async().await;

            let first = server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/api/v4/issues")
                        .query_param("state", "opened")
                        .query_param("per_page", "10")
                        .query_param("page", "1");
                    then.status(200)
                        .header("x-next-page", "2")
                        .json_body(json!([{"id": 3}, {"id": 1}]));
                })
                .await;
            let second = server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/api/v4/issues")
                        .query_param("state", "opened")
                        .query_param("page", "2");
                    then.status(200)
                        .header("x-next-page", "")
                        .json_body(json!([{"id": 7}]));
                })
                .await;

            let client = create_test_client(&server);
            let issues = client
                .list("issues", &QueryParams::new().with("state", "opened"))
                .await
                .unwrap();

            first.assert_hits_async(1).await;
            second.assert_hits_async(1).await;
            assert_eq!(ids(&issues), vec![3, 1, 7]);
        }

        #[tokio::test]
        async fn test_list_explicit_page_fetches_one_page() {
            let server = MockServer::start_async().await;

            let mock = server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/api/v4/projects")
                        .query_param("page", "3")
                        .query_param("per_page", "2");
                    then.status(200)
                        .header("x-next-page", "4")
                        .json_body(json!([{"id": 5}, {"id": 6}]));
                })
                .await;

            let client = create_test_client(&server);
            let projects = client
                .list(
                    "projects",
                    &QueryParams::new().with("page", 3).with("per_page", 2),
                )
                .await
                .unwrap();

            mock.assert_hits_async(1).await;
            assert_eq!(ids(&projects), vec![5, 6]);
        }

        #[tokio::test]
        async fn test_oauth_and_job_headers() {
            let server = MockServer::start_async().await;

            let oauth = server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/api/v4/user/1")
                        .header("Authorization", "Bearer oauth-token");
                    then.status(200).json_body(json!({"id": 1}));
                })
                .await;
            let job = server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/api/v4/user/2")
                        .header("JOB-TOKEN", "job-token");
                    then.status(200).json_body(json!({"id": 2}));
                })
                .await;

            let oauth_client = ConnectionFactory::build(&ConnectionParams {
                oauth_token: Some("oauth-token".to_string()),
                job_token: Some("job-token".to_string()),
                ..ConnectionParams::new(server.base_url())
            })
            .unwrap();
            let job_client = ConnectionFactory::build(&ConnectionParams {
                job_token: Some("job-token".to_string()),
                ..ConnectionParams::new(server.base_url())
            })
            .unwrap();

            oauth_client.get("user", 1).await.unwrap();
            job_client.get("user", 2).await.unwrap();

            oauth.assert_async().await;
            job.assert_async().await;
        }

        #[tokio::test]
        async fn test_transient_error_not_retried_when_disabled() {
            let server = MockServer::start_async().await;

            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/api/v4/issues");
                    then.status(503).body("{\"message\":\"503 Service Unavailable\"}");
                })
                .await;

            let client = create_test_client(&server);
            let err = client
                .list("issues", &QueryParams::new())
                .await
                .unwrap_err();

            mock.assert_hits_async(1).await;
            assert_eq!(err.status, Some(503));
            assert_eq!(err.reason.as_deref(), Some("Service Unavailable"));
            assert_eq!(err.message, "503 Service Unavailable");
            assert_eq!(err.operation, "GET /issues");
        }

        #[tokio::test]
        async fn test_transient_error_retried_up_to_limit() {
            let server = MockServer::start_async().await;

            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/api/v4/projects/9");
                    then.status(502);
                })
                .await;

            let client = ConnectionFactory::build(&ConnectionParams {
                retry_transient_errors: true,
                max_retries: 2,
                ..params(&server)
            })
            .unwrap();
            let err = client.get("projects", 9).await.unwrap_err();

            mock.assert_hits_async(3).await;
            assert_eq!(err.status, Some(502));
            assert_eq!(err.message, "Bad Gateway");
        }

        #[tokio::test]
        async fn test_client_error_never_retried() {
            let server = MockServer::start_async().await;

            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/api/v4/projects/999");
                    then.status(404).body("{\"message\":\"404 Project Not Found\"}");
                })
                .await;

            let client = ConnectionFactory::build(&ConnectionParams {
                retry_transient_errors: true,
                max_retries: 5,
                ..params(&server)
            })
            .unwrap();
            let err = client.get("projects", 999).await.unwrap_err();

            mock.assert_hits_async(1).await;
            assert_eq!(err.status, Some(404));
            assert!(!err.is_transient());
            assert_eq!(err.message, "404 Project Not Found");
        }

        #[tokio::test]
        async fn test_connection_failure_has_no_status() {
            let client =
                ConnectionFactory::build(&ConnectionParams::new("http://127.0.0.1:1")).unwrap();
            let err = client.get("projects", 1).await.unwrap_err();

            assert_eq!(err.status, None);
            assert_eq!(err.operation, "GET /projects/1");
        }

        #[tokio::test]
        async fn test_malformed_body() {
            let server = MockServer::start_async().await;

            server
                .mock_async(|when, then| {
                    when.method(GET).path("/api/v4/projects");
                    then.status(200).body("not json");
                })
                .await;

            let client = create_test_client(&server);
            let err = client
                .list("projects", &QueryParams::new())
                .await
                .unwrap_err();

            assert_eq!(err.status, None);
            assert!(err.message.starts_with("Failed to parse response"));
        }

        #[tokio::test]
        async fn test_accessor_get_by_name() {
            let server = MockServer::start_async().await;

            let search = server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/api/v4/projects")
                        .query_param("search", "my-app")
                        .query_param("top_level_only", "true");
                    then.status(200)
                        .json_body(json!([{"id": 42, "name": "my-app"}]));
                })
                .await;
            let fetch = server
                .mock_async(|when, then| {
                    when.method(GET).path("/api/v4/projects/42");
                    then.status(200).json_body(json!({
                        "id": 42,
                        "name": "my-app",
                        "default_branch": "main"
                    }));
                })
                .await;

            let client = create_test_client(&server);
            let accessor = CollectionAccessor::new(&client);
            let project = accessor
                .get("projects", &Locator::parse("my-app"))
                .await
                .unwrap();

            search.assert_async().await;
            fetch.assert_async().await;
            assert_eq!(project.get("default_branch"), Some(&json!("main")));
        }

        #[tokio::test]
        async fn test_accessor_ambiguous_name() {
            let server = MockServer::start_async().await;

            server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/api/v4/projects")
                        .query_param("search", "app");
                    then.status(200)
                        .json_body(json!([{"id": 42}, {"id": 43}]));
                })
                .await;
            let fetch = server
                .mock_async(|when, then| {
                    when.method(GET).path("/api/v4/projects/42");
                    then.status(200).json_body(json!({"id": 42}));
                })
                .await;

            let client = create_test_client(&server);
            let accessor = CollectionAccessor::new(&client);
            let err = accessor
                .get("projects", &Locator::parse("app"))
                .await
                .unwrap_err();

            fetch.assert_hits_async(0).await;
            assert!(matches!(
                err,
                AccessError::Resolution(ResolutionError::Ambiguous { count: 2, .. })
            ));
        }
    }
}
