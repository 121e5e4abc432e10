//! Concept change notifications.

use serde::{Deserialize, Serialize};

/// `{"action": "concept-update", "concept-id": "C123-PROV"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptEvent {
    pub action: ConceptAction,
    #[serde(rename = "concept-id")]
    pub concept_id: String,
    #[serde(rename = "revision-id", default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<u64>,
}

impl ConceptEvent {
    pub fn update(concept_id: impl Into<String>) -> Self {
        Self {
            action: ConceptAction::ConceptUpdate,
            concept_id: concept_id.into(),
            revision_id: None,
        }
    }

    pub fn delete(concept_id: impl Into<String>) -> Self {
        Self {
            action: ConceptAction::ConceptDelete,
            concept_id: concept_id.into(),
            revision_id: None,
        }
    }

    pub fn concept_type(&self) -> ConceptType {
        ConceptType::of(&self.concept_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConceptAction {
    ConceptUpdate,
    ConceptDelete,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptType {
    Collection,
    Acl,
    Other,
}

impl ConceptType {
    /// Concept ids carry their type as a prefix: `C1200-PROV`, `ACL1200-CMR`.
    pub fn of(concept_id: &str) -> Self {
        if concept_id.starts_with("ACL") {
            ConceptType::Acl
        } else if concept_id.starts_with('C') {
            ConceptType::Collection
        } else {
            ConceptType::Other
        }
    }
}
