//! GitLab transport for labkit.
//!
//! Implements [`labkit_core::ApiClient`] over the GitLab REST API v4:
//! credential headers, page draining and transient-error retry.

mod client;
mod connection;
mod types;

pub use client::{GitLabClient, RetryPolicy};
pub use connection::ConnectionFactory;
pub use types::{GitLabErrorBody, GitLabObject};

/// The only REST API version GitLab serves.
pub const SUPPORTED_API_VERSION: u32 = 4;
