//! Capability traits for REST transports.
//!
//! The core never talks HTTP itself. Anything that can list a collection and
//! fetch one member by numeric ID can back the resolver and the accessor.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::types::{Attributes, QueryParams};

/// A resource object as returned by the remote API.
pub trait RawObject {
    /// Flat field-name-to-value view of the object.
    fn attributes(&self) -> Attributes;

    /// The canonical numeric `id` field, if the object carries one.
    fn id(&self) -> Option<u64> {
        self.attributes().get("id").and_then(Value::as_u64)
    }
}

impl RawObject for Attributes {
    fn attributes(&self) -> Attributes {
        self.clone()
    }

    fn id(&self) -> Option<u64> {
        self.get("id").and_then(Value::as_u64)
    }
}

/// Read access to a resource-oriented REST API.
///
/// `list` returns every page of the collection, concatenated in the order the
/// remote sent them. Transient-error retries, if any, happen inside the
/// implementation; a returned error is final.
#[cfg_attr(test, mockall::automock(type Object = Attributes;))]
#[async_trait]
pub trait ApiClient: Send + Sync {
    type Object: RawObject + Send;

    async fn list(
        &self,
        path: &str,
        params: &QueryParams,
    ) -> Result<Vec<Self::Object>, TransportError>;

    async fn get(&self, path: &str, id: u64) -> Result<Self::Object, TransportError>;
}
