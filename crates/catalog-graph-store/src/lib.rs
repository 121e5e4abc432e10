//! Catalog Graph Store: property-graph model and idempotent upserts
//!
//! Everything the indexer writes goes through the [`GraphStore`] trait:
//!
//! ```text
//! ┌──────────────┐   VertexSpec / EdgeSpec   ┌──────────────────────────┐
//! │   Indexer    │──────────────────────────►│  upsert_vertex / _edge   │
//! └──────────────┘                           │  (validation + context)  │
//!                                            └────────────┬─────────────┘
//!                                                         │ one call
//!                                     ┌───────────────────┴──────────────┐
//!                                     ▼                                  ▼
//!                          ┌────────────────────┐             ┌────────────────────┐
//!                          │   GremlinClient    │             │    MemoryGraph     │
//!                          │ (one traversal per │             │ (one critical      │
//!                          │  HTTP round trip)  │             │  section per call) │
//!                          └────────────────────┘             └────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - At most one vertex per `(label, key property, key value)`.
//! - At most one edge per `(label, from, to)`.
//! - Find-or-create is a single store-side operation. Callers never compose
//!   "read, then conditionally write" themselves.

pub mod gremlin;
pub mod memory;
pub mod upsert;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use gremlin::{GremlinClient, GremlinConfig};
pub use memory::{MemoryGraph, Operation};
pub use upsert::{upsert_edge, upsert_vertex, UpsertFailure, UpsertTarget};

// ============================================================================
// Core Types
// ============================================================================

/// Store-assigned element identifier.
///
/// TinkerGraph hands out integers, Neptune and [`MemoryGraph`] hand out
/// strings. The engine never chooses one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementId {
    Int(i64),
    Text(String),
}

impl ElementId {
    /// Decode an id from a (GraphSON-unwrapped) JSON scalar.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(ElementId::Int),
            serde_json::Value::String(s) => Some(ElementId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ElementId::Int(n) => serde_json::Value::from(*n),
            ElementId::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Int(n) => write!(f, "{n}"),
            ElementId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        ElementId::Text(s.to_string())
    }
}

/// Scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Bool(b) => serde_json::Value::from(*b),
            PropertyValue::Int(n) => serde_json::Value::from(*n),
            PropertyValue::Float(x) => serde_json::Value::from(*x),
            PropertyValue::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(n) => write!(f, "{n}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Int(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// A stored vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: ElementId,
    pub label: String,
    pub properties: Properties,
}

/// A stored, directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: ElementId,
    pub label: String,
    pub from: ElementId,
    pub to: ElementId,
    pub properties: Properties,
}

/// Natural key of a vertex: its label plus the designated unique property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexKey {
    pub label: String,
    pub property: String,
    pub value: PropertyValue,
}

impl VertexKey {
    pub fn new(
        label: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Self {
            label: label.into(),
            property: property.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for VertexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}={}]", self.label, self.property, self.value)
    }
}

/// Request to find-or-create a vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexSpec {
    pub key: VertexKey,
    /// Written only when the vertex is created.
    pub properties: Properties,
    /// Written on every upsert, whether the vertex existed or not.
    pub refresh: Properties,
}

impl VertexSpec {
    pub fn new(key: VertexKey) -> Self {
        Self {
            key,
            properties: Properties::new(),
            refresh: Properties::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn refresh(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.refresh.insert(name.into(), value.into());
        self
    }
}

/// Request to find-or-create an edge between two existing vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    pub label: String,
    pub from: ElementId,
    pub to: ElementId,
    /// Written only when the edge is created.
    pub properties: Properties,
}

impl EdgeSpec {
    pub fn new(label: impl Into<String>, from: ElementId, to: ElementId) -> Self {
        Self {
            label: label.into(),
            from,
            to,
            properties: Properties::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// Edge direction as seen from an anchor vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Edge points away from the anchor.
    Out,
    /// Edge points into the anchor.
    In,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no vertex found for {0}")]
    NotFound(String),
    #[error("edge endpoint missing: from [{from}] to [{to}]")]
    MissingEndpoint { from: ElementId, to: ElementId },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("graph server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Store Interface
// ============================================================================

/// Primitives the remote graph store must offer.
///
/// Implementations must make `find_or_create_vertex` and
/// `find_or_create_edge` atomic with respect to concurrent callers.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Resolve the vertex with `spec.key`, creating it if absent.
    async fn find_or_create_vertex(&self, spec: &VertexSpec) -> Result<ElementId, GraphError>;

    /// Resolve the `spec.label` edge from `spec.from` to `spec.to`, creating it if absent.
    async fn find_or_create_edge(&self, spec: &EdgeSpec) -> Result<ElementId, GraphError>;

    /// Read-only lookup of a vertex id by natural key.
    async fn find_vertex_id(&self, key: &VertexKey) -> Result<Option<ElementId>, GraphError>;

    /// Drop every vertex matching `key` together with its incident edges.
    ///
    /// Returns how many vertices were dropped; zero is not an error.
    async fn drop_vertices(&self, key: &VertexKey) -> Result<u64, GraphError>;

    /// Drop the `edge_label` neighbours of the vertex at `anchor` whose only
    /// `edge_label` edge is the one to `anchor`.
    async fn drop_exclusive_neighbors(
        &self,
        anchor: &VertexKey,
        edge_label: &str,
        direction: Direction,
    ) -> Result<u64, GraphError>;

    fn backend_name(&self) -> &'static str;
}
