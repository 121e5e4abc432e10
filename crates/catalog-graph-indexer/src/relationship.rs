//! RelationshipIndexer: one related entity plus its edge to a parent.
//!
//! The vertex upsert and the edge upsert are independent. If the edge fails
//! the vertex stays; the next run for the same parent re-attempts the edge,
//! which is idempotent.

use crate::outcome::IndexOutcome;
use crate::schema::Relation;
use catalog_graph_store::{
    upsert_edge, upsert_vertex, Direction, EdgeSpec, ElementId, GraphStore, Properties,
    PropertyValue, VertexKey, VertexSpec,
};

/// A related entity extracted from a parent record.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedRecord {
    pub key: PropertyValue,
    pub properties: Properties,
    pub refresh: Properties,
}

impl RelatedRecord {
    pub fn new(key: impl Into<PropertyValue>) -> Self {
        Self {
            key: key.into(),
            properties: Properties::new(),
            refresh: Properties::new(),
        }
    }

    pub fn property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Set `name` only if `value` is present.
    pub fn optional(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.property(name, v),
            _ => self,
        }
    }

    pub fn refresh(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.refresh.insert(name.to_string(), value.into());
        self
    }
}

pub struct RelationshipIndexer<'a> {
    graph: &'a dyn GraphStore,
}

impl<'a> RelationshipIndexer<'a> {
    pub fn new(graph: &'a dyn GraphStore) -> Self {
        Self { graph }
    }

    pub async fn index(
        &self,
        relation: &Relation,
        record: &RelatedRecord,
        parent: &ElementId,
    ) -> IndexOutcome {
        let key = VertexKey::new(relation.label, relation.key_property, record.key.clone());
        let spec = VertexSpec {
            key,
            properties: record.properties.clone(),
            refresh: record.refresh.clone(),
        };

        let related = match upsert_vertex(self.graph, &spec).await {
            Ok(id) => id,
            Err(failure) => {
                tracing::warn!(
                    label = relation.label,
                    key = %record.key,
                    parent = %parent,
                    error = %failure,
                    "failed to index related vertex"
                );
                return IndexOutcome::failed(failure);
            }
        };

        let (from, to) = match relation.direction {
            Direction::In => (related.clone(), parent.clone()),
            Direction::Out => (parent.clone(), related.clone()),
        };
        let edge = match upsert_edge(self.graph, &EdgeSpec::new(relation.edge_label, from, to)).await
        {
            Ok(id) => id,
            Err(failure) => {
                tracing::warn!(
                    label = relation.label,
                    key = %record.key,
                    vertex = %related,
                    parent = %parent,
                    error = %failure,
                    "related vertex indexed but its edge failed"
                );
                return IndexOutcome::failed(failure);
            }
        };

        tracing::info!(
            label = relation.label,
            key = %record.key,
            vertex = %related,
            edge = %edge,
            parent = %parent,
            "{} indexed",
            relation.label
        );
        IndexOutcome::Indexed {
            vertex: related,
            edges: vec![edge],
            related_failures: 0,
        }
    }
}
