//! VertexUpsert and EdgeUpsert
//!
//! Thin, validating wrappers over the store's atomic find-or-create
//! primitives. They never retry; the caller owns retry policy.

use crate::{EdgeSpec, ElementId, GraphError, GraphStore, PropertyValue, VertexKey, VertexSpec};
use std::fmt;

/// What an upsert was trying to resolve when it failed.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertTarget {
    Vertex { key: VertexKey },
    Edge { label: String, from: ElementId, to: ElementId },
}

impl fmt::Display for UpsertTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpsertTarget::Vertex { key } => write!(f, "vertex {key}"),
            UpsertTarget::Edge { label, from, to } => {
                write!(f, "edge {label} [{from}] -> [{to}]")
            }
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to upsert {target}: {source}")]
pub struct UpsertFailure {
    pub target: UpsertTarget,
    #[source]
    pub source: GraphError,
}

fn validate_key(key: &VertexKey) -> Result<(), GraphError> {
    if key.label.trim().is_empty() {
        return Err(GraphError::InvalidRequest("vertex label is empty".to_string()));
    }
    if key.property.trim().is_empty() {
        return Err(GraphError::InvalidRequest(format!(
            "key property is empty for label '{}'",
            key.label
        )));
    }
    match &key.value {
        PropertyValue::Text(s) if s.is_empty() => Err(GraphError::InvalidRequest(format!(
            "key value for {}.{} is empty",
            key.label, key.property
        ))),
        PropertyValue::Float(x) if x.is_nan() => Err(GraphError::InvalidRequest(format!(
            "key value for {}.{} is not comparable",
            key.label, key.property
        ))),
        _ => Ok(()),
    }
}

/// Find-or-create the vertex identified by `spec.key` and return its id.
///
/// Whether the vertex pre-existed is deliberately not reported.
pub async fn upsert_vertex(
    store: &dyn GraphStore,
    spec: &VertexSpec,
) -> Result<ElementId, UpsertFailure> {
    let fail = |source| UpsertFailure {
        target: UpsertTarget::Vertex {
            key: spec.key.clone(),
        },
        source,
    };

    validate_key(&spec.key).map_err(fail)?;

    let id = store.find_or_create_vertex(spec).await.map_err(fail)?;
    tracing::debug!(
        backend = store.backend_name(),
        key = %spec.key,
        vertex = %id,
        "vertex upserted"
    );
    Ok(id)
}

/// Find-or-create the `spec.label` edge between two existing vertices.
pub async fn upsert_edge(
    store: &dyn GraphStore,
    spec: &EdgeSpec,
) -> Result<ElementId, UpsertFailure> {
    let fail = |source| UpsertFailure {
        target: UpsertTarget::Edge {
            label: spec.label.clone(),
            from: spec.from.clone(),
            to: spec.to.clone(),
        },
        source,
    };

    if spec.label.trim().is_empty() {
        return Err(fail(GraphError::InvalidRequest(
            "edge label is empty".to_string(),
        )));
    }

    let id = store.find_or_create_edge(spec).await.map_err(fail)?;
    tracing::debug!(
        backend = store.backend_name(),
        label = %spec.label,
        from = %spec.from,
        to = %spec.to,
        edge = %id,
        "edge upserted"
    );
    Ok(id)
}
