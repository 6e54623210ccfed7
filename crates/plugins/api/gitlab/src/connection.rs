//! Client handle construction.

use labkit_core::config::MAX_PER_PAGE;
use labkit_core::{ConfigError, ConnectionParams};
use tracing::{debug, warn};

use crate::client::{GitLabClient, RetryPolicy};
use crate::SUPPORTED_API_VERSION;

const USER_AGENT: &str = concat!("labkit/", env!("CARGO_PKG_VERSION"));

/// Builds [`GitLabClient`] handles from connection parameters.
pub struct ConnectionFactory;

impl ConnectionFactory {
    /// Validate `params` and build a handle.
    ///
    /// No network I/O happens here; the first request opens the connection.
    /// The page size is forwarded as configured, the remote enforces its own
    /// ceiling.
    pub fn build(params: &ConnectionParams) -> Result<GitLabClient, ConfigError> {
        let url = params.url.as_deref().ok_or(ConfigError::MissingUrl)?;
        validate_url(url)?;

        if params.api_version != SUPPORTED_API_VERSION {
            return Err(ConfigError::UnsupportedApiVersion(params.api_version));
        }

        if !(1..=MAX_PER_PAGE).contains(&params.per_page) {
            warn!(
                per_page = params.per_page,
                "Page size outside 1..=100, the server will clamp or reject it"
            );
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(params.timeout_duration())
            .danger_accept_invalid_certs(!params.ssl_verify)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        let credential = params.credential();
        let retry = RetryPolicy {
            enabled: params.retry_transient_errors,
            max_retries: params.max_retries,
        };

        debug!(
            url = url,
            credential = credential.kind(),
            per_page = params.per_page,
            retry_transient_errors = retry.enabled,
            max_retries = retry.max_retries,
            "GitLab client configured"
        );

        Ok(GitLabClient::from_parts(
            url,
            params.api_version,
            credential,
            params.per_page,
            retry,
            client,
        ))
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = reqwest::Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
