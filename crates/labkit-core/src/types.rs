//! Common types shared by the core and the transports.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AccessError;

/// Flat field-name-to-value representation of a remote resource.
///
/// Field order is the order the remote API sent them in.
pub type Attributes = Map<String, Value>;

// =============================================================================
// Locator
// =============================================================================

/// Caller-supplied reference to a single resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Canonical numeric ID, used directly
    Id(u64),
    /// Human-readable name that must resolve to exactly one ID
    Name(String),
}

impl Locator {
    /// Integers become `Id`, anything else is a `Name`.
    pub fn parse(input: &str) -> Self {
        match input.trim().parse::<u64>() {
            Ok(id) => Locator::Id(id),
            Err(_) => Locator::Name(input.to_string()),
        }
    }
}

impl From<u64> for Locator {
    fn from(id: u64) -> Self {
        Locator::Id(id)
    }
}

impl From<&str> for Locator {
    fn from(input: &str) -> Self {
        Locator::parse(input)
    }
}

impl FromStr for Locator {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Locator::parse(s))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "{}", id),
            Locator::Name(name) => f.write_str(name),
        }
    }
}

// =============================================================================
// Query parameters
// =============================================================================

/// Filter parameters for a collection query.
///
/// A `null` value means "unset". [`QueryParams::compact`] strips those entries
/// so they are absent from the request rather than sent empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, Value>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Drop every null-valued entry.
    pub fn compact(mut self) -> Self {
        self.0.retain(|_, value| !value.is_null());
        self
    }

    /// Render as `key=value` pairs for a query string.
    ///
    /// Strings go out verbatim, arrays are joined with `,`, other values use
    /// their JSON text. Null entries are skipped.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), render_value(value)))
            .collect()
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(","),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<Map<String, Value>> for QueryParams {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Structured failure handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub operation: Option<String>,
    pub reason: Option<String>,
    pub status: Option<u16>,
    /// Stable failure kind, e.g. `not_found` or `list_failed`
    pub tag: String,
}

impl ErrorRecord {
    /// Record for a failure that never reached the remote API.
    pub fn local(message: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            operation: None,
            reason: None,
            status: None,
            tag: tag.into(),
        }
    }
}

/// Normalized result of one get or list call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Resource(Attributes),
    Collection(Vec<Attributes>),
    Failure(ErrorRecord),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failure(_))
    }

    /// The payload half of the outbound pair.
    pub fn payload(&self) -> Value {
        match self {
            Outcome::Resource(attributes) => Value::Object(attributes.clone()),
            Outcome::Collection(items) => {
                Value::Array(items.iter().cloned().map(Value::Object).collect())
            }
            Outcome::Failure(record) => serde_json::to_value(record).unwrap_or(Value::Null),
        }
    }

    /// `(success, payload)` as returned to the host.
    pub fn into_pair(self) -> (bool, Value) {
        (self.is_success(), self.payload())
    }

    /// `(success, [payload, params])`, echoing what was submitted.
    pub fn into_pair_with_params(self, params: &QueryParams) -> (bool, Value) {
        let submitted = serde_json::to_value(params).unwrap_or(Value::Null);
        (
            self.is_success(),
            Value::Array(vec![self.payload(), submitted]),
        )
    }
}

impl From<Result<Attributes, AccessError>> for Outcome {
    fn from(result: Result<Attributes, AccessError>) -> Self {
        match result {
            Ok(attributes) => Outcome::Resource(attributes),
            Err(e) => Outcome::Failure(e.record()),
        }
    }
}

impl From<Result<Vec<Attributes>, AccessError>> for Outcome {
    fn from(result: Result<Vec<Attributes>, AccessError>) -> Self {
        match result {
            Ok(items) => Outcome::Collection(items),
            Err(e) => Outcome::Failure(e.record()),
        }
    }
}
