//! Core traits, types, and error handling for labkit.
//!
//! This crate holds everything that does not depend on a particular REST
//! transport: the [`ApiClient`] capability, name resolution, the collection
//! accessor and the normalized [`Outcome`] shape handed back to hosts.

pub mod accessor;
pub mod client;
pub mod config;
pub mod error;
pub mod resolver;
pub mod types;

pub use accessor::CollectionAccessor;
pub use client::{ApiClient, RawObject};
pub use config::{Config, ConnectionParams, Credential};
pub use error::{
    is_transient_status, AccessError, ConfigError, Error, ResolutionError, Result, TransportError,
};
pub use resolver::ResourceResolver;
pub use types::{Attributes, ErrorRecord, Locator, Outcome, QueryParams};
