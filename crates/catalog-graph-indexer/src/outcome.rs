//! Per-entity results.
//!
//! Indexing never raises past the entity boundary; it reports one of these
//! instead so a batch can carry on with its other entities.

use catalog_graph_store::ElementId;

#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    Indexed {
        vertex: ElementId,
        /// Edges resolved for the entity's relationships.
        edges: Vec<ElementId>,
        /// Related entities that could not be indexed.
        related_failures: usize,
    },
    Deleted {
        vertices: u64,
    },
    Skipped {
        reason: String,
    },
    Failed {
        cause: String,
    },
}

impl IndexOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        IndexOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(cause: impl ToString) -> Self {
        IndexOutcome::Failed {
            cause: cause.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, IndexOutcome::Indexed { .. } | IndexOutcome::Deleted { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, IndexOutcome::Failed { .. })
    }

    pub fn vertex(&self) -> Option<&ElementId> {
        match self {
            IndexOutcome::Indexed { vertex, .. } => Some(vertex),
            _ => None,
        }
    }
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(String, IndexOutcome)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, IndexOutcome::Skipped { .. }))
            .count()
    }

    pub fn get(&self, concept_id: &str) -> Option<&IndexOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == concept_id)
            .map(|(_, o)| o)
    }
}
