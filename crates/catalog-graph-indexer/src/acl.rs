//! Access-control entries: the acl vertex is replaced wholesale on every
//! revision, then linked to its groups and to the datasets it covers.

use crate::delete;
use crate::outcome::IndexOutcome;
use crate::relationship::{RelatedRecord, RelationshipIndexer};
use crate::replace::ReplaceIndexer;
use crate::schema;
use catalog_graph_store::{upsert_edge, EdgeSpec, ElementId, GraphStore, VertexKey, VertexSpec};
use catalog_graph_upstream::AclRecord;

pub struct AclIndexer<'a> {
    graph: &'a dyn GraphStore,
}

impl<'a> AclIndexer<'a> {
    pub fn new(graph: &'a dyn GraphStore) -> Self {
        Self { graph }
    }

    pub async fn index(&self, concept_id: &str, record: &AclRecord) -> IndexOutcome {
        let identity = record.catalog_item_identity.as_ref();
        let Some(collections) = identity
            .and_then(|i| i.collection_identifier.as_ref())
            .filter(|c| !c.concept_ids.is_empty() || !c.entry_titles.is_empty())
        else {
            // A revision that no longer targets collections must not leave the
            // previous acl vertex behind. An empty identifier targets nothing.
            let removed = delete::delete_acl(self.graph, concept_id).await;
            tracing::info!(concept_id, ?removed, "acl has no collection identifier, skipped");
            return IndexOutcome::skipped("acl has no collection identifier");
        };

        let mut spec = VertexSpec::new(VertexKey::new(schema::ACL, schema::CONCEPT_ID, concept_id));
        if let Some(name) = identity.and_then(|i| i.name.as_deref()) {
            spec = spec.property("name", name);
        }
        if let Some(provider) = identity.and_then(|i| i.provider_id.as_deref()) {
            spec = spec.property("provider-id", provider);
        }
        if let Some(guid) = record.legacy_guid.as_deref() {
            spec = spec.property("legacy-guid", guid);
        }

        let replaced = ReplaceIndexer::new(self.graph).replace(&spec).await;
        let acl = match (replaced.is_success(), replaced.vertex) {
            (true, Some(id)) => id,
            _ => {
                let cause = replaced
                    .cause
                    .unwrap_or_else(|| "replace ended without a vertex".to_string());
                return IndexOutcome::Failed { cause };
            }
        };

        let mut edges = Vec::new();
        let mut related_failures = 0usize;

        let relationships = RelationshipIndexer::new(self.graph);
        for permission in &record.group_permissions {
            let Some(group_id) = permission.group_id.as_deref().filter(|g| !g.is_empty()) else {
                tracing::debug!(
                    concept_id,
                    user_type = permission.user_type.as_deref().unwrap_or(""),
                    "permission is not for a group"
                );
                continue;
            };
            let group = RelatedRecord::new(group_id)
                .refresh("permissions", permission.permissions.join(","));
            match relationships.index(&schema::GROUP, &group, &acl).await {
                IndexOutcome::Indexed { edges: mut e, .. } => edges.append(&mut e),
                _ => related_failures += 1,
            }
        }

        for collection in &collections.concept_ids {
            match self.link_collection(concept_id, &acl, collection).await {
                Ok(Some(edge)) => edges.push(edge),
                Ok(None) => {}
                Err(()) => related_failures += 1,
            }
        }

        tracing::info!(
            concept_id,
            vertex = %acl,
            edges = edges.len(),
            related_failures,
            "acl indexed"
        );
        IndexOutcome::Indexed {
            vertex: acl,
            edges,
            related_failures,
        }
    }

    /// hasAccessTo edge to an already indexed dataset. `Ok(None)` when the
    /// dataset is not in the graph yet.
    async fn link_collection(
        &self,
        concept_id: &str,
        acl: &ElementId,
        collection: &str,
    ) -> Result<Option<ElementId>, ()> {
        let key = VertexKey::new(schema::DATASET, schema::CONCEPT_ID, collection);
        let dataset = match self.graph.find_vertex_id(&key).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::info!(concept_id, collection, "collection not indexed, no access edge");
                return Ok(None);
            }
            Err(error) => {
                tracing::warn!(concept_id, collection, %error, "failed to look up collection");
                return Err(());
            }
        };

        let spec = EdgeSpec::new(schema::HAS_ACCESS_TO, acl.clone(), dataset);
        match upsert_edge(self.graph, &spec).await {
            Ok(edge) => Ok(Some(edge)),
            Err(failure) => {
                tracing::warn!(concept_id, collection, error = %failure, "failed to link acl");
                Err(())
            }
        }
    }
}
