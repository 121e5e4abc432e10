//! Removal of datasets and acls.

use crate::outcome::IndexOutcome;
use crate::schema;
use catalog_graph_store::{GraphError, GraphStore, VertexKey};

/// Drop neighbours that belong to this dataset alone, then the dataset.
/// Neighbours shared with other datasets survive.
pub async fn delete_collection(graph: &dyn GraphStore, concept_id: &str) -> IndexOutcome {
    let key = VertexKey::new(schema::DATASET, schema::CONCEPT_ID, concept_id);
    let mut removed = 0u64;

    for relation in schema::COLLECTION_RELATIONS {
        match graph
            .drop_exclusive_neighbors(&key, relation.edge_label, relation.direction)
            .await
        {
            Ok(n) => removed += n,
            Err(GraphError::NotFound(_)) => {}
            Err(error) => {
                tracing::error!(concept_id, label = relation.label, %error, "failed to drop neighbours");
                return IndexOutcome::failed(error);
            }
        }
    }

    match drop_key(graph, &key).await {
        Ok(n) => {
            removed += n;
            tracing::info!(concept_id, removed, "collection deleted");
            IndexOutcome::Deleted { vertices: removed }
        }
        Err(error) => {
            tracing::error!(concept_id, %error, "failed to delete dataset");
            IndexOutcome::failed(error)
        }
    }
}

/// Drop the acl vertex and its edges. Groups may be shared and are kept.
pub async fn delete_acl(graph: &dyn GraphStore, concept_id: &str) -> IndexOutcome {
    let key = VertexKey::new(schema::ACL, schema::CONCEPT_ID, concept_id);
    match drop_key(graph, &key).await {
        Ok(removed) => {
            tracing::info!(concept_id, removed, "acl deleted");
            IndexOutcome::Deleted { vertices: removed }
        }
        Err(error) => {
            tracing::error!(concept_id, %error, "failed to delete acl");
            IndexOutcome::failed(error)
        }
    }
}

async fn drop_key(graph: &dyn GraphStore, key: &VertexKey) -> Result<u64, GraphError> {
    match graph.drop_vertices(key).await {
        Err(GraphError::NotFound(_)) => Ok(0),
        other => other,
    }
}
