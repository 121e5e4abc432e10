//! Vertex labels, natural keys and relationship edges of the catalog graph.

use catalog_graph_store::Direction;

pub const DATASET: &str = "dataset";
pub const ACL: &str = "acl";

/// Natural key of datasets and ACLs.
pub const CONCEPT_ID: &str = "concept-id";

pub const HAS_ACCESS_TO: &str = "hasAccessTo";

/// How a related entity hangs off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub label: &'static str,
    pub key_property: &'static str,
    pub edge_label: &'static str,
    /// Edge direction seen from the parent: `In` means related → parent.
    pub direction: Direction,
}

/// campaign -includedIn-> dataset
pub const CAMPAIGN: Relation = Relation {
    label: "campaign",
    key_property: "name",
    edge_label: "includedIn",
    direction: Direction::In,
};

/// dataset -documentedBy-> relatedUrl
pub const RELATED_URL: Relation = Relation {
    label: "relatedUrl",
    key_property: "url",
    edge_label: "documentedBy",
    direction: Direction::Out,
};

/// dataset -acquiredBy-> platformInstrument
pub const PLATFORM_INSTRUMENT: Relation = Relation {
    label: "platformInstrument",
    key_property: "name",
    edge_label: "acquiredBy",
    direction: Direction::Out,
};

/// group -accessControlledBy-> acl
pub const GROUP: Relation = Relation {
    label: "group",
    key_property: "group-id",
    edge_label: "accessControlledBy",
    direction: Direction::In,
};

/// Relations owned by a dataset, cleaned up when it is deleted.
pub const COLLECTION_RELATIONS: [Relation; 3] = [CAMPAIGN, RELATED_URL, PLATFORM_INSTRUMENT];
