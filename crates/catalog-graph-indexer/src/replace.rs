//! ReplaceIndexer: delete whatever is stored under a natural key, then
//! recreate it from the current record.
//!
//! ```text
//! Start ──► DeleteExisting ──► CreateNew ──► Done
//!                 │                 │
//!                 └──────► Failed ◄─┘
//! ```
//!
//! Delete-then-create is not safe against a concurrent replace of the same
//! key. Callers serialize per key (see `Indexer`, which does so in-process).

use catalog_graph_store::{upsert_vertex, ElementId, GraphError, GraphStore, VertexSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceState {
    Start,
    DeleteExisting,
    CreateNew,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceOutcome {
    pub state: ReplaceState,
    pub vertex: Option<ElementId>,
    /// Vertices removed during DeleteExisting.
    pub removed: u64,
    pub cause: Option<String>,
}

impl ReplaceOutcome {
    pub fn is_success(&self) -> bool {
        self.state == ReplaceState::Done
    }
}

pub struct ReplaceIndexer<'a> {
    graph: &'a dyn GraphStore,
}

impl<'a> ReplaceIndexer<'a> {
    pub fn new(graph: &'a dyn GraphStore) -> Self {
        Self { graph }
    }

    pub async fn replace(&self, spec: &VertexSpec) -> ReplaceOutcome {
        let mut outcome = ReplaceOutcome {
            state: ReplaceState::Start,
            vertex: None,
            removed: 0,
            cause: None,
        };

        self.advance(&mut outcome, ReplaceState::DeleteExisting, spec);
        match self.graph.drop_vertices(&spec.key).await {
            Ok(removed) => outcome.removed = removed,
            Err(GraphError::NotFound(_)) => {
                tracing::debug!(key = %spec.key, "nothing to delete before replace");
            }
            Err(error) => {
                tracing::error!(key = %spec.key, %error, "failed to delete existing vertex");
                outcome.cause = Some(error.to_string());
                self.advance(&mut outcome, ReplaceState::Failed, spec);
                return outcome;
            }
        }

        self.advance(&mut outcome, ReplaceState::CreateNew, spec);
        match upsert_vertex(self.graph, spec).await {
            Ok(id) => {
                tracing::info!(key = %spec.key, vertex = %id, removed = outcome.removed, "vertex replaced");
                outcome.vertex = Some(id);
                self.advance(&mut outcome, ReplaceState::Done, spec);
            }
            Err(failure) => {
                tracing::error!(key = %spec.key, error = %failure, "failed to create replacement vertex");
                outcome.cause = Some(failure.to_string());
                self.advance(&mut outcome, ReplaceState::Failed, spec);
            }
        }
        outcome
    }

    fn advance(&self, outcome: &mut ReplaceOutcome, next: ReplaceState, spec: &VertexSpec) {
        tracing::trace!(key = %spec.key, from = ?outcome.state, to = ?next, "replace transition");
        outcome.state = next;
    }
}
