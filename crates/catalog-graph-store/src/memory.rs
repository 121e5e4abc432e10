//! In-process graph store.
//!
//! Every primitive runs inside one critical section, which gives the same
//! atomicity the Gremlin backend gets from a single server-side traversal.
//! Used for local runs and tests; supports one-shot failure injection.

use crate::{
    Direction, Edge, EdgeSpec, ElementId, GraphError, GraphStore, Properties, Vertex, VertexKey,
    VertexSpec,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Store primitive, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    UpsertVertex,
    UpsertEdge,
    FindVertex,
    DropVertices,
    DropNeighbors,
}

struct InjectedFailure {
    operation: Operation,
    label: Option<String>,
    error: GraphError,
}

#[derive(Default)]
struct GraphState {
    vertices: BTreeMap<ElementId, Vertex>,
    edges: BTreeMap<ElementId, Edge>,
}

impl GraphState {
    fn matches(vertex: &Vertex, key: &VertexKey) -> bool {
        vertex.label == key.label && vertex.properties.get(&key.property) == Some(&key.value)
    }

    fn find(&self, key: &VertexKey) -> Option<ElementId> {
        self.vertices
            .values()
            .find(|v| Self::matches(v, key))
            .map(|v| v.id.clone())
    }

    fn remove_vertex(&mut self, id: &ElementId) {
        self.vertices.remove(id);
        self.edges.retain(|_, e| &e.from != id && &e.to != id);
    }
}

#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<GraphState>,
    failures: Mutex<Vec<InjectedFailure>>,
    operations: AtomicUsize,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `operation` (optionally only for `label`) fail with `error`.
    pub fn fail_once(&self, operation: Operation, label: Option<&str>, error: GraphError) {
        self.failures.lock().push(InjectedFailure {
            operation,
            label: label.map(str::to_string),
            error,
        });
    }

    /// Number of store calls served so far (one per round trip).
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    pub fn vertex_count(&self) -> usize {
        self.state.lock().vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.lock().edges.len()
    }

    pub fn vertices_with_label(&self, label: &str) -> Vec<Vertex> {
        self.state
            .lock()
            .vertices
            .values()
            .filter(|v| v.label == label)
            .cloned()
            .collect()
    }

    pub fn vertices_by_key(&self, key: &VertexKey) -> Vec<Vertex> {
        self.state
            .lock()
            .vertices
            .values()
            .filter(|v| GraphState::matches(v, key))
            .cloned()
            .collect()
    }

    pub fn edges_with_label(&self, label: &str) -> Vec<Edge> {
        self.state
            .lock()
            .edges
            .values()
            .filter(|e| e.label == label)
            .cloned()
            .collect()
    }

    pub fn vertex(&self, id: &ElementId) -> Option<Vertex> {
        self.state.lock().vertices.get(id).cloned()
    }

    async fn enter(&self, operation: Operation, label: &str) -> Result<(), GraphError> {
        // Let other tasks interleave between calls, as a network hop would.
        tokio::task::yield_now().await;
        self.operations.fetch_add(1, Ordering::SeqCst);

        let mut failures = self.failures.lock();
        let hit = failures.iter().position(|f| {
            f.operation == operation && f.label.as_deref().map_or(true, |l| l == label)
        });
        match hit {
            Some(idx) => Err(failures.remove(idx).error),
            None => Ok(()),
        }
    }
}

fn new_id() -> ElementId {
    ElementId::Text(Uuid::new_v4().to_string())
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn find_or_create_vertex(&self, spec: &VertexSpec) -> Result<ElementId, GraphError> {
        self.enter(Operation::UpsertVertex, &spec.key.label).await?;

        let mut state = self.state.lock();
        let id = match state.find(&spec.key) {
            Some(id) => id,
            None => {
                let id = new_id();
                let mut properties = spec.properties.clone();
                properties.insert(spec.key.property.clone(), spec.key.value.clone());
                state.vertices.insert(
                    id.clone(),
                    Vertex {
                        id: id.clone(),
                        label: spec.key.label.clone(),
                        properties,
                    },
                );
                id
            }
        };

        if let Some(vertex) = state.vertices.get_mut(&id) {
            for (name, value) in &spec.refresh {
                vertex.properties.insert(name.clone(), value.clone());
            }
        }
        Ok(id)
    }

    async fn find_or_create_edge(&self, spec: &EdgeSpec) -> Result<ElementId, GraphError> {
        self.enter(Operation::UpsertEdge, &spec.label).await?;

        let mut state = self.state.lock();
        if !state.vertices.contains_key(&spec.from) || !state.vertices.contains_key(&spec.to) {
            return Err(GraphError::MissingEndpoint {
                from: spec.from.clone(),
                to: spec.to.clone(),
            });
        }

        let existing = state
            .edges
            .values()
            .find(|e| e.label == spec.label && e.from == spec.from && e.to == spec.to)
            .map(|e| e.id.clone());
        if let Some(id) = existing {
            return Ok(id);
        }

        let id = new_id();
        state.edges.insert(
            id.clone(),
            Edge {
                id: id.clone(),
                label: spec.label.clone(),
                from: spec.from.clone(),
                to: spec.to.clone(),
                properties: spec.properties.clone(),
            },
        );
        Ok(id)
    }

    async fn find_vertex_id(&self, key: &VertexKey) -> Result<Option<ElementId>, GraphError> {
        self.enter(Operation::FindVertex, &key.label).await?;
        Ok(self.state.lock().find(key))
    }

    async fn drop_vertices(&self, key: &VertexKey) -> Result<u64, GraphError> {
        self.enter(Operation::DropVertices, &key.label).await?;

        let mut state = self.state.lock();
        let doomed: Vec<ElementId> = state
            .vertices
            .values()
            .filter(|v| GraphState::matches(v, key))
            .map(|v| v.id.clone())
            .collect();
        for id in &doomed {
            state.remove_vertex(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn drop_exclusive_neighbors(
        &self,
        anchor: &VertexKey,
        edge_label: &str,
        direction: Direction,
    ) -> Result<u64, GraphError> {
        self.enter(Operation::DropNeighbors, &anchor.label).await?;

        let mut state = self.state.lock();
        let anchors: Vec<ElementId> = state
            .vertices
            .values()
            .filter(|v| GraphState::matches(v, anchor))
            .map(|v| v.id.clone())
            .collect();

        let mut doomed = Vec::new();
        for anchor_id in &anchors {
            for edge in state.edges.values().filter(|e| e.label == edge_label) {
                let neighbor = match direction {
                    Direction::Out if &edge.from == anchor_id => &edge.to,
                    Direction::In if &edge.to == anchor_id => &edge.from,
                    _ => continue,
                };
                // Count the neighbour's edges of this label on the far side.
                let links = state
                    .edges
                    .values()
                    .filter(|e| {
                        e.label == edge_label
                            && match direction {
                                Direction::Out => &e.to == neighbor,
                                Direction::In => &e.from == neighbor,
                            }
                    })
                    .count();
                if links <= 1 && !doomed.contains(neighbor) {
                    doomed.push(neighbor.clone());
                }
            }
        }

        for id in &doomed {
            state.remove_vertex(id);
        }
        Ok(doomed.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl MemoryGraph {
    /// Properties of the single vertex with `key`, if exactly one exists.
    pub fn properties_of(&self, key: &VertexKey) -> Option<Properties> {
        let matches = self.vertices_by_key(key);
        match matches.as_slice() {
            [only] => Some(only.properties.clone()),
            _ => None,
        }
    }
}
