//! Name-to-ID resolution.

use tracing::debug;

use crate::client::{ApiClient, RawObject};
use crate::error::{ResolutionError, TransportError};
use crate::types::QueryParams;

/// Turns a human-readable name into the one numeric ID it denotes.
pub struct ResourceResolver<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: ApiClient + ?Sized> ResourceResolver<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Search `collection` for `name` and require exactly one match.
    ///
    /// Zero matches is `NotFound`, more than one is `Ambiguous`. There is no
    /// best-effort pick among several candidates.
    pub async fn resolve(&self, collection: &str, name: &str) -> Result<u64, ResolutionError> {
        debug!(collection = collection, name = name, "Resolving name to ID");

        let params = search_params(name);
        let matches = self
            .client
            .list(collection, &params)
            .await
            .map_err(|source| {
                debug!(error = %source, name = name, "Name lookup failed");
                ResolutionError::ApiFailure {
                    name: name.to_string(),
                    source,
                }
            })?;

        match matches.as_slice() {
            [] => Err(ResolutionError::NotFound {
                collection: collection.to_string(),
                name: name.to_string(),
            }),
            [only] => only.id().ok_or_else(|| ResolutionError::ApiFailure {
                name: name.to_string(),
                source: TransportError::new(
                    format!("GET /{}", collection),
                    "search result has no numeric id",
                ),
            }),
            many => Err(ResolutionError::Ambiguous {
                collection: collection.to_string(),
                name: name.to_string(),
                count: many.len(),
            }),
        }
    }
}

fn search_params(name: &str) -> QueryParams {
    QueryParams::new()
        .with("search", name)
        .with("top_level_only", true)
}
