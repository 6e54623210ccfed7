//! Get and list calls against a resource collection.

use tracing::debug;

use crate::client::{ApiClient, RawObject};
use crate::error::AccessError;
use crate::resolver::ResourceResolver;
use crate::types::{Attributes, Locator, Outcome, QueryParams};

/// Reads resources from one API client and normalizes the results.
///
/// Every failure comes back as a tagged [`AccessError`], so "no results" and
/// "the call failed" stay distinguishable.
pub struct CollectionAccessor<'a, C: ?Sized> {
    client: &'a C,
    resolver: ResourceResolver<'a, C>,
}

impl<'a, C: ApiClient + ?Sized> CollectionAccessor<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            resolver: ResourceResolver::new(client),
        }
    }

    /// Fetch one resource. Names are resolved to an ID first.
    pub async fn get(&self, collection: &str, locator: &Locator) -> Result<Attributes, AccessError> {
        let id = match locator {
            Locator::Id(id) => *id,
            Locator::Name(name) => self.resolver.resolve(collection, name).await?,
        };

        match self.client.get(collection, id).await {
            Ok(object) => Ok(object.attributes()),
            Err(e) => {
                debug!(
                    collection = collection,
                    id = id,
                    status = ?e.status,
                    error = %e,
                    "Get failed"
                );
                Err(AccessError::GetFailed(e))
            }
        }
    }

    /// Fetch every page of a collection.
    ///
    /// Null-valued filters are dropped before the request is built.
    pub async fn list(
        &self,
        collection: &str,
        params: &QueryParams,
    ) -> Result<Vec<Attributes>, AccessError> {
        let params = params.clone().compact();
        debug!(collection = collection, filters = params.len(), "Listing collection");

        match self.client.list(collection, &params).await {
            Ok(objects) => Ok(objects.iter().map(RawObject::attributes).collect()),
            Err(e) => {
                debug!(
                    collection = collection,
                    status = ?e.status,
                    error = %e,
                    "List failed"
                );
                Err(AccessError::ListFailed(e))
            }
        }
    }

    /// [`get`](Self::get), normalized into an [`Outcome`].
    pub async fn get_outcome(&self, collection: &str, locator: &Locator) -> Outcome {
        self.get(collection, locator).await.into()
    }

    /// [`list`](Self::list), normalized into an [`Outcome`].
    pub async fn list_outcome(&self, collection: &str, params: &QueryParams) -> Outcome {
        self.list(collection, params).await.into()
    }
}
