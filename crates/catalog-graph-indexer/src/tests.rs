//! Tests for relationship, replace, collection and acl indexing

use super::*;
use catalog_graph_store::{
    Direction, ElementId, GraphError, GraphStore, MemoryGraph, Operation, PropertyValue,
    VertexKey, VertexSpec,
};
use catalog_graph_upstream::{
    AclRecord, CatalogItemIdentity, CollectionIdentifier, CollectionMeta, CollectionRecord,
    CollectionUmm, Doi, GroupPermission, InstrumentRef, PlatformRef, ProjectRef, RelatedUrl,
    StaticSecretStore, UpstreamConfig,
};
use proptest::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROOT: &str = "https://cmr.test";

fn text(value: &str) -> PropertyValue {
    PropertyValue::from(value)
}

fn dataset_key(concept_id: &str) -> VertexKey {
    VertexKey::new(schema::DATASET, schema::CONCEPT_ID, concept_id)
}

async fn parent_dataset(graph: &MemoryGraph, concept_id: &str) -> ElementId {
    graph
        .find_or_create_vertex(&VertexSpec::new(dataset_key(concept_id)))
        .await
        .unwrap()
}

fn collection(concept_id: &str) -> CollectionRecord {
    CollectionRecord {
        meta: CollectionMeta {
            concept_id: concept_id.to_string(),
            provider_id: Some("PROV".to_string()),
        },
        umm: CollectionUmm {
            entry_title: Some("Ocean temperature".to_string()),
            short_name: Some("OT".to_string()),
            doi: Some(Doi {
                doi: Some("doi:10.5067/ABC".to_string()),
            }),
            related_urls: vec![RelatedUrl {
                url: Some("https://example.com/guide".to_string()),
                kind: Some("VIEW RELATED INFORMATION".to_string()),
                subtype: Some("USER'S GUIDE".to_string()),
                description: None,
            }],
            projects: vec![ProjectRef {
                short_name: Some("OceanTemp2024".to_string()),
                long_name: None,
            }],
            platforms: vec![PlatformRef {
                short_name: Some("Terra".to_string()),
                instruments: vec![
                    InstrumentRef {
                        short_name: Some("MODIS".to_string()),
                    },
                    InstrumentRef {
                        short_name: Some("ASTER".to_string()),
                    },
                ],
            }],
        },
    }
}

fn acl(collections: &[&str]) -> AclRecord {
    AclRecord {
        catalog_item_identity: Some(CatalogItemIdentity {
            name: Some("All PROV collections".to_string()),
            provider_id: Some("PROV".to_string()),
            collection_identifier: Some(CollectionIdentifier {
                concept_ids: collections.iter().map(|c| c.to_string()).collect(),
                entry_titles: Vec::new(),
            }),
        }),
        group_permissions: vec![
            GroupPermission {
                permissions: vec!["read".to_string(), "order".to_string()],
                group_id: Some("AG1-PROV".to_string()),
                user_type: None,
            },
            GroupPermission {
                permissions: vec!["read".to_string()],
                group_id: None,
                user_type: Some("guest".to_string()),
            },
        ],
        legacy_guid: Some("GUID-1".to_string()),
    }
}

// ============================================================================
// RelationshipIndexer
// ============================================================================

#[tokio::test]
async fn test_campaign_indexed_once_under_parent() {
    let graph = MemoryGraph::new();
    let parent = parent_dataset(&graph, "V1").await;
    let indexer = RelationshipIndexer::new(&graph);
    let campaign = RelatedRecord::new("OceanTemp2024");

    let first = indexer.index(&schema::CAMPAIGN, &campaign, &parent).await;
    let (vertices, edges) = (graph.vertex_count(), graph.edge_count());
    let second = indexer.index(&schema::CAMPAIGN, &campaign, &parent).await;

    assert_eq!(first, second);
    assert_eq!((graph.vertex_count(), graph.edge_count()), (vertices, edges));
    assert_eq!(graph.vertices_with_label("campaign").len(), 1);

    let edge = &graph.edges_with_label("includedIn")[0];
    assert_eq!(Some(&edge.from), first.vertex());
    assert_eq!(edge.to, parent);
}

#[tokio::test]
async fn test_outward_relation_points_from_parent() {
    let graph = MemoryGraph::new();
    let parent = parent_dataset(&graph, "C1-PROV").await;
    let related = RelatedRecord::new("https://example.com/guide").property("type", "GET DATA");

    let outcome = RelationshipIndexer::new(&graph)
        .index(&schema::RELATED_URL, &related, &parent)
        .await;

    let edge = &graph.edges_with_label("documentedBy")[0];
    assert_eq!(edge.from, parent);
    assert_eq!(Some(&edge.to), outcome.vertex());
}

#[tokio::test]
async fn test_edge_failure_leaves_vertex_and_rerun_repairs() {
    let graph = MemoryGraph::new();
    let parent = parent_dataset(&graph, "V1").await;
    let indexer = RelationshipIndexer::new(&graph);
    let campaign = RelatedRecord::new("OceanTemp2024");

    graph.fail_once(
        Operation::UpsertEdge,
        Some("includedIn"),
        GraphError::Transport("connection reset".into()),
    );
    let outcome = indexer.index(&schema::CAMPAIGN, &campaign, &parent).await;

    match &outcome {
        IndexOutcome::Failed { cause } => assert!(cause.contains("includedIn"), "{cause}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(graph.vertices_with_label("campaign").len(), 1);
    assert_eq!(graph.edge_count(), 0);

    let retried = indexer.index(&schema::CAMPAIGN, &campaign, &parent).await;
    assert!(retried.is_success());
    assert_eq!(graph.vertices_with_label("campaign").len(), 1);
    assert_eq!(graph.edges_with_label("includedIn").len(), 1);
}

#[tokio::test]
async fn test_vertex_failure_skips_edge() {
    let graph = MemoryGraph::new();
    let parent = parent_dataset(&graph, "V1").await;
    graph.fail_once(
        Operation::UpsertVertex,
        Some("campaign"),
        GraphError::Server {
            status: 500,
            message: "boom".into(),
        },
    );

    let before = graph.operation_count();
    let outcome = RelationshipIndexer::new(&graph)
        .index(&schema::CAMPAIGN, &RelatedRecord::new("X"), &parent)
        .await;

    assert!(outcome.is_failure());
    assert_eq!(graph.operation_count() - before, 1);
    assert_eq!(graph.edge_count(), 0);
}

// ============================================================================
// ReplaceIndexer
// ============================================================================

fn acl_spec(name: &str) -> VertexSpec {
    VertexSpec::new(VertexKey::new(schema::ACL, schema::CONCEPT_ID, "ACL1-CMR")).property("name", name)
}

#[tokio::test]
async fn test_replace_discards_previous_properties() {
    let graph = MemoryGraph::new();
    let replace = ReplaceIndexer::new(&graph);

    let first = replace.replace(&acl_spec("old")).await;
    assert_eq!(first.state, ReplaceState::Done);
    assert_eq!(first.removed, 0);

    let second = replace.replace(&acl_spec("new")).await;
    assert!(second.is_success());
    assert_eq!(second.removed, 1);
    assert_ne!(first.vertex, second.vertex);

    let key = VertexKey::new(schema::ACL, schema::CONCEPT_ID, "ACL1-CMR");
    let props = graph.properties_of(&key).unwrap();
    assert_eq!(props.get("name"), Some(&text("new")));
}

#[tokio::test]
async fn test_replace_treats_not_found_as_empty() {
    let graph = MemoryGraph::new();
    graph.fail_once(
        Operation::DropVertices,
        None,
        GraphError::NotFound("acl[concept-id=ACL1-CMR]".into()),
    );

    let outcome = ReplaceIndexer::new(&graph).replace(&acl_spec("a")).await;
    assert_eq!(outcome.state, ReplaceState::Done);
    assert!(outcome.vertex.is_some());
}

#[tokio::test]
async fn test_replace_delete_failure_creates_nothing() {
    let graph = MemoryGraph::new();
    let replace = ReplaceIndexer::new(&graph);
    replace.replace(&acl_spec("old")).await;

    graph.fail_once(
        Operation::DropVertices,
        None,
        GraphError::Transport("timeout".into()),
    );
    let outcome = replace.replace(&acl_spec("new")).await;

    assert_eq!(outcome.state, ReplaceState::Failed);
    assert!(outcome.vertex.is_none());
    assert!(outcome.cause.unwrap().contains("timeout"));

    let key = VertexKey::new(schema::ACL, schema::CONCEPT_ID, "ACL1-CMR");
    let props = graph.properties_of(&key).unwrap();
    assert_eq!(props.get("name"), Some(&text("old")));
}

#[tokio::test]
async fn test_replace_create_failure_reports_cause() {
    let graph = MemoryGraph::new();
    graph.fail_once(
        Operation::UpsertVertex,
        Some("acl"),
        GraphError::InvalidResponse("garbled".into()),
    );

    let outcome = ReplaceIndexer::new(&graph).replace(&acl_spec("a")).await;
    assert_eq!(outcome.state, ReplaceState::Failed);
    assert!(outcome.cause.unwrap().contains("garbled"));
    assert_eq!(graph.vertex_count(), 0);
}

// ============================================================================
// Collections
// ============================================================================

#[tokio::test]
async fn test_collection_builds_dataset_and_neighbours() {
    let graph = MemoryGraph::new();
    let outcome = CollectionIndexer::new(&graph, ROOT)
        .index(&collection("C1-PROV"))
        .await;

    match &outcome {
        IndexOutcome::Indexed {
            edges,
            related_failures,
            ..
        } => {
            assert_eq!(edges.len(), 4);
            assert_eq!(*related_failures, 0);
        }
        other => panic!("expected indexed, got {other:?}"),
    }

    let props = graph.properties_of(&dataset_key("C1-PROV")).unwrap();
    assert_eq!(props.get("name"), Some(&text("https://dx.doi.org/10.5067/ABC")));
    assert_eq!(props.get("doi"), Some(&text("doi:10.5067/ABC")));
    assert_eq!(props.get("title"), Some(&text("Ocean temperature")));

    assert_eq!(graph.vertices_with_label("campaign").len(), 1);
    assert_eq!(graph.vertices_with_label("relatedUrl").len(), 1);
    assert_eq!(graph.vertices_with_label("platformInstrument").len(), 2);
    assert_eq!(graph.edges_with_label("acquiredBy").len(), 2);

    let guide = VertexKey::new("relatedUrl", "url", "https://example.com/guide");
    let props = graph.properties_of(&guide).unwrap();
    assert_eq!(props.get("subtype"), Some(&text("USER'S GUIDE")));
    assert!(!props.contains_key("description"));
}

#[tokio::test]
async fn test_collection_reindex_is_idempotent() {
    let graph = MemoryGraph::new();
    let indexer = CollectionIndexer::new(&graph, ROOT);
    let record = collection("C1-PROV");

    let first = indexer.index(&record).await;
    let counts = (graph.vertex_count(), graph.edge_count());
    let second = indexer.index(&record).await;

    assert_eq!(first, second);
    assert_eq!((graph.vertex_count(), graph.edge_count()), counts);
}

#[tokio::test]
async fn test_collection_without_doi_links_landing_page() {
    let graph = MemoryGraph::new();
    let mut record = collection("C2-PROV");
    record.umm.doi = None;

    CollectionIndexer::new(&graph, "https://cmr.test/")
        .index(&record)
        .await;

    let props = graph.properties_of(&dataset_key("C2-PROV")).unwrap();
    assert_eq!(
        props.get("name"),
        Some(&text("https://cmr.test/concepts/C2-PROV.html"))
    );
    assert_eq!(props.get("doi"), Some(&text("Not provided")));
}

#[tokio::test]
async fn test_collection_related_failures_are_counted() {
    let graph = MemoryGraph::new();
    let mut record = collection("C1-PROV");
    record.umm.projects.push(ProjectRef::default());
    graph.fail_once(
        Operation::UpsertVertex,
        Some("relatedUrl"),
        GraphError::Transport("reset".into()),
    );

    let outcome = CollectionIndexer::new(&graph, ROOT).index(&record).await;

    match outcome {
        IndexOutcome::Indexed {
            related_failures, ..
        } => assert_eq!(related_failures, 2),
        other => panic!("expected indexed, got {other:?}"),
    }
    assert_eq!(graph.vertices_with_label("campaign").len(), 1);
}

#[tokio::test]
async fn test_collection_dataset_failure_stops_early() {
    let graph = MemoryGraph::new();
    graph.fail_once(
        Operation::UpsertVertex,
        Some("dataset"),
        GraphError::Transport("down".into()),
    );

    let outcome = CollectionIndexer::new(&graph, ROOT)
        .index(&collection("C1-PROV"))
        .await;
    assert!(outcome.is_failure());
    assert_eq!(graph.vertex_count(), 0);
}

#[test]
fn test_platform_without_instruments_keyed_by_platform() {
    let mut record = collection("C1-PROV");
    record.umm.platforms = vec![PlatformRef {
        short_name: Some("Aqua".to_string()),
        instruments: Vec::new(),
    }];
    let graph = MemoryGraph::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(CollectionIndexer::new(&graph, ROOT).index(&record));

    let key = VertexKey::new("platformInstrument", "name", "Aqua");
    assert_eq!(graph.vertices_by_key(&key).len(), 1);
}

// ============================================================================
// ACLs
// ============================================================================

#[tokio::test]
async fn test_acl_links_groups_and_indexed_collections() {
    let graph = MemoryGraph::new();
    CollectionIndexer::new(&graph, ROOT)
        .index(&collection("C1-PROV"))
        .await;

    let outcome = AclIndexer::new(&graph)
        .index("ACL1-CMR", &acl(&["C1-PROV", "C404-PROV"]))
        .await;

    match &outcome {
        IndexOutcome::Indexed {
            edges,
            related_failures,
            ..
        } => {
            assert_eq!(edges.len(), 2);
            assert_eq!(*related_failures, 0);
        }
        other => panic!("expected indexed, got {other:?}"),
    }

    let group = VertexKey::new("group", "group-id", "AG1-PROV");
    let props = graph.properties_of(&group).unwrap();
    assert_eq!(props.get("permissions"), Some(&text("read,order")));
    assert_eq!(graph.vertices_with_label("group").len(), 1);

    let access = graph.edges_with_label("hasAccessTo");
    assert_eq!(access.len(), 1);
    assert_eq!(Some(&access[0].from), outcome.vertex());

    let controlled = graph.edges_with_label("accessControlledBy");
    assert_eq!(Some(&controlled[0].to), outcome.vertex());
}

#[tokio::test]
async fn test_acl_revision_replaces_vertex_without_duplicates() {
    let graph = MemoryGraph::new();
    CollectionIndexer::new(&graph, ROOT)
        .index(&collection("C1-PROV"))
        .await;
    let indexer = AclIndexer::new(&graph);

    indexer.index("ACL1-CMR", &acl(&["C1-PROV"])).await;
    let mut revised = acl(&["C1-PROV"]);
    if let Some(identity) = revised.catalog_item_identity.as_mut() {
        identity.name = Some("Renamed".to_string());
    }
    revised.group_permissions[0].permissions = vec!["read".to_string()];
    let outcome = indexer.index("ACL1-CMR", &revised).await;
    assert!(outcome.is_success());

    let key = VertexKey::new(schema::ACL, schema::CONCEPT_ID, "ACL1-CMR");
    assert_eq!(graph.vertices_by_key(&key).len(), 1);
    assert_eq!(
        graph.properties_of(&key).unwrap().get("name"),
        Some(&text("Renamed"))
    );
    assert_eq!(graph.vertices_with_label("group").len(), 1);
    assert_eq!(graph.edges_with_label("accessControlledBy").len(), 1);
    assert_eq!(graph.edges_with_label("hasAccessTo").len(), 1);

    let group = VertexKey::new("group", "group-id", "AG1-PROV");
    assert_eq!(
        graph.properties_of(&group).unwrap().get("permissions"),
        Some(&text("read"))
    );
}

#[tokio::test]
async fn test_acl_without_collection_identifier_is_skipped_and_removed() {
    let graph = MemoryGraph::new();
    let indexer = AclIndexer::new(&graph);
    indexer.index("ACL1-CMR", &acl(&["C9-PROV"])).await;
    assert_eq!(graph.vertices_with_label("acl").len(), 1);

    let mut record = acl(&["C9-PROV"]);
    if let Some(identity) = record.catalog_item_identity.as_mut() {
        identity.collection_identifier = None;
    }
    let outcome = indexer.index("ACL1-CMR", &record).await;

    assert!(matches!(outcome, IndexOutcome::Skipped { .. }));
    assert!(graph.vertices_with_label("acl").is_empty());
}

#[tokio::test]
async fn test_acl_with_empty_collection_identifier_is_skipped() {
    let graph = MemoryGraph::new();
    let indexer = AclIndexer::new(&graph);
    indexer.index("ACL1-CMR", &acl(&["C9-PROV"])).await;

    // `"collection_identifier": {}` on the wire
    let record: AclRecord = serde_json::from_value(json!({
        "group_permissions": [{"permissions": ["read"], "group_id": "AG1-PROV"}],
        "catalog_item_identity": {"name": "Nothing", "collection_identifier": {}}
    }))
    .unwrap();
    let identifier = record
        .catalog_item_identity
        .as_ref()
        .and_then(|i| i.collection_identifier.as_ref());
    assert_eq!(identifier, Some(&CollectionIdentifier::default()));

    let outcome = indexer.index("ACL1-CMR", &record).await;

    assert!(matches!(outcome, IndexOutcome::Skipped { .. }));
    assert!(graph.vertices_with_label("acl").is_empty());

    let mut titled = acl(&[]);
    if let Some(collections) = titled
        .catalog_item_identity
        .as_mut()
        .and_then(|i| i.collection_identifier.as_mut())
    {
        collections.entry_titles = vec!["Ocean temperature".to_string()];
    }
    assert!(indexer.index("ACL1-CMR", &titled).await.is_success());
}

#[tokio::test]
async fn test_acl_replace_failure_fails_entity() {
    let graph = MemoryGraph::new();
    graph.fail_once(
        Operation::DropVertices,
        Some("acl"),
        GraphError::Transport("down".into()),
    );

    let outcome = AclIndexer::new(&graph).index("ACL1-CMR", &acl(&["C9-PROV"])).await;
    assert!(outcome.is_failure());
    assert!(graph.vertices_with_label("group").is_empty());
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_delete_collection_keeps_shared_neighbours() {
    let graph = MemoryGraph::new();
    let indexer = CollectionIndexer::new(&graph, ROOT);
    indexer.index(&collection("C1-PROV")).await;

    let mut other = collection("C2-PROV");
    other.umm.related_urls.clear();
    other.umm.platforms.clear();
    indexer.index(&other).await;

    let outcome = delete::delete_collection(&graph, "C1-PROV").await;

    // relatedUrl + two platformInstruments + the dataset
    assert_eq!(outcome, IndexOutcome::Deleted { vertices: 4 });
    assert!(graph.vertices_by_key(&dataset_key("C1-PROV")).is_empty());
    assert_eq!(graph.vertices_with_label("campaign").len(), 1);
    assert!(graph.vertices_with_label("relatedUrl").is_empty());
    assert_eq!(graph.edges_with_label("includedIn").len(), 1);
}

#[tokio::test]
async fn test_delete_missing_collection_is_success() {
    let graph = MemoryGraph::new();
    let outcome = delete::delete_collection(&graph, "C9-PROV").await;
    assert_eq!(outcome, IndexOutcome::Deleted { vertices: 0 });
}

#[tokio::test]
async fn test_delete_failure_is_reported() {
    let graph = MemoryGraph::new();
    graph.fail_once(
        Operation::DropNeighbors,
        None,
        GraphError::Transport("down".into()),
    );
    assert!(delete::delete_collection(&graph, "C1-PROV").await.is_failure());
}

#[tokio::test]
async fn test_delete_acl_keeps_groups() {
    let graph = MemoryGraph::new();
    AclIndexer::new(&graph).index("ACL1-CMR", &acl(&["C9-PROV"])).await;

    let outcome = delete::delete_acl(&graph, "ACL1-CMR").await;

    assert_eq!(outcome, IndexOutcome::Deleted { vertices: 1 });
    assert_eq!(graph.vertices_with_label("group").len(), 1);
    assert_eq!(graph.edge_count(), 0);
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn test_event_parsing_and_type() {
    let event: ConceptEvent =
        serde_json::from_value(json!({"action": "concept-delete", "concept-id": "ACL12-CMR"}))
            .unwrap();
    assert_eq!(event.action, ConceptAction::ConceptDelete);
    assert_eq!(event.concept_type(), ConceptType::Acl);

    let event: ConceptEvent = serde_json::from_value(
        json!({"action": "concept-revision", "concept-id": "C1-PROV", "revision-id": 3}),
    )
    .unwrap();
    assert_eq!(event.action, ConceptAction::Unsupported);
    assert_eq!(event.revision_id, Some(3));

    assert_eq!(ConceptType::of("C1-PROV"), ConceptType::Collection);
    assert_eq!(ConceptType::of("G1-PROV"), ConceptType::Other);
}

#[test]
fn test_zero_concurrency_rejected() {
    assert!(IndexerConfig::default().with_concurrency(0).is_err());
    assert_eq!(
        IndexerConfig::default().with_concurrency(3).unwrap().concurrency,
        3
    );
}

fn concurrency_var(value: &'static str) -> impl Fn(&str) -> Option<String> {
    move |key: &str| (key == "INDEX_CONCURRENCY").then(|| value.to_string())
}

#[test]
fn test_concurrency_loaded_through_lookup() {
    let config = IndexerConfig::from_lookup(concurrency_var("4")).unwrap();
    assert_eq!(config.concurrency, 4);
    let blank = IndexerConfig::from_lookup(concurrency_var("")).unwrap();
    assert_eq!(blank.concurrency, 8);
    assert_eq!(IndexerConfig::from_lookup(|_: &str| None).unwrap().concurrency, 8);
    assert!(IndexerConfig::from_lookup(concurrency_var("0")).is_err());
    assert!(IndexerConfig::from_lookup(concurrency_var("many")).is_err());
}

// ============================================================================
// Indexer
// ============================================================================

fn local_indexer(server: &MockServer, graph: Arc<MemoryGraph>) -> Indexer {
    let config = UpstreamConfig::local(&server.uri()).unwrap();
    let tokens = TokenProvider::new(Arc::new(StaticSecretStore::new()), &config);
    Indexer::new(
        graph,
        CatalogClient::new(config).unwrap(),
        tokens,
        IndexerConfig::default().with_concurrency(2).unwrap(),
    )
}

async fn mount_collection(server: &MockServer, concept_id: &str) {
    Mock::given(method("GET"))
        .and(path("/search/collections.umm_json"))
        .and(query_param("concept_id", concept_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": 1,
            "items": [{
                "meta": {"concept-id": concept_id, "provider-id": "PROV"},
                "umm": {
                    "EntryTitle": format!("Title of {concept_id}"),
                    "Projects": [{"ShortName": "OceanTemp2024"}]
                }
            }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_event_update_then_delete() {
    let server = MockServer::start().await;
    mount_collection(&server, "C1-PROV").await;
    let graph = Arc::new(MemoryGraph::new());
    let indexer = local_indexer(&server, graph.clone());

    let indexed = indexer
        .handle_event(&ConceptEvent::update("C1-PROV"))
        .await
        .unwrap();
    assert!(indexed.is_success());
    assert_eq!(graph.vertices_with_label("campaign").len(), 1);

    let deleted = indexer
        .handle_event(&ConceptEvent::delete("C1-PROV"))
        .await
        .unwrap();
    assert_eq!(deleted, IndexOutcome::Deleted { vertices: 2 });
    assert_eq!(graph.vertex_count(), 0);
}

#[tokio::test]
async fn test_unknown_concept_type_is_skipped() {
    let server = MockServer::start().await;
    let graph = Arc::new(MemoryGraph::new());
    let indexer = local_indexer(&server, graph.clone());

    let outcome = indexer
        .handle_event(&ConceptEvent::update("G1200-PROV"))
        .await
        .unwrap();
    assert!(matches!(outcome, IndexOutcome::Skipped { .. }));
    assert_eq!(graph.operation_count(), 0);
}

#[tokio::test]
async fn test_batch_isolates_entities() {
    let server = MockServer::start().await;
    mount_collection(&server, "C1-PROV").await;
    mount_collection(&server, "C3-PROV").await;
    Mock::given(method("GET"))
        .and(query_param("concept_id", "C2-PROV"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let graph = Arc::new(MemoryGraph::new());
    let indexer = local_indexer(&server, graph.clone());
    let ids = vec![
        "C1-PROV".to_string(),
        "C2-PROV".to_string(),
        "X1-PROV".to_string(),
        "C3-PROV".to_string(),
    ];

    let report = indexer.index_batch(ids.clone()).await.unwrap();

    let order: Vec<&str> = report.outcomes.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(order, ids.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.skipped(), 2);
    assert_eq!(report.failed(), 0);
    assert_eq!(graph.vertices_with_label("dataset").len(), 2);
    assert_eq!(graph.vertices_with_label("campaign").len(), 1);
    assert_eq!(graph.edges_with_label("includedIn").len(), 2);
}

#[tokio::test]
async fn test_missing_token_escapes_before_graph_writes() {
    let server = MockServer::start().await;
    let config = UpstreamConfig::new(&server.uri(), "sit", "cmr-token").unwrap();
    let tokens = TokenProvider::new(Arc::new(StaticSecretStore::new()), &config);
    let graph = Arc::new(MemoryGraph::new());
    let indexer = Indexer::new(
        graph.clone(),
        CatalogClient::new(config).unwrap(),
        tokens,
        IndexerConfig::default(),
    );

    let err = indexer.index_collection("C1-PROV").await.unwrap_err();
    assert!(matches!(err, TokenError::TokenNotFound { .. }));
    assert!(indexer
        .index_batch(vec!["C1-PROV".to_string()])
        .await
        .is_err());
    assert_eq!(graph.operation_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acl_updates_leave_one_vertex() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/access-control/acls/ACL1-CMR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "group_permissions": [{"permissions": ["read"], "group_id": "AG1-PROV"}],
            "catalog_item_identity": {
                "name": "All",
                "collection_identifier": {"concept_ids": ["C1-PROV"]}
            }
        })))
        .mount(&server)
        .await;

    let graph = Arc::new(MemoryGraph::new());
    let indexer = local_indexer(&server, graph.clone());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let indexer = indexer.clone();
        handles.push(tokio::spawn(async move {
            indexer.index_acl("ACL1-CMR").await
        }));
    }
    // A replace racing another caller would drop the vertex that caller is
    // linking groups to, leaving it with no edges and a related failure.
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        match &outcome {
            IndexOutcome::Indexed {
                edges,
                related_failures: 0,
                ..
            } => assert_eq!(edges.len(), 1, "{outcome:?}"),
            other => panic!("expected a clean index, got {other:?}"),
        }
    }

    assert_eq!(graph.vertices_with_label("acl").len(), 1);
    assert_eq!(graph.vertices_with_label("group").len(), 1);
    assert_eq!(graph.edges_with_label("accessControlledBy").len(), 1);
}

#[tokio::test]
async fn test_harvest_acls_indexes_every_listed_acl() {
    let server = MockServer::start().await;
    mount_collection(&server, "C1-PROV").await;
    Mock::given(method("GET"))
        .and(path("/access-control/acls"))
        .and(query_param("identity_type", "catalog_item"))
        .and(query_param("page_num", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": 2,
            "items": [{"concept_id": "ACL1-CMR"}, {"concept_id": "ACL2-CMR"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/access-control/acls/ACL1-CMR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "group_permissions": [{"permissions": ["read"], "group_id": "AG1-PROV"}],
            "catalog_item_identity": {
                "name": "PROV collections",
                "collection_identifier": {"concept_ids": ["C1-PROV"]}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/access-control/acls/ACL2-CMR"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let graph = Arc::new(MemoryGraph::new());
    let indexer = local_indexer(&server, graph.clone());
    assert!(indexer.index_collection("C1-PROV").await.unwrap().is_success());

    let report = indexer.harvest_acls().await.unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.skipped(), 1);
    assert!(matches!(report.get("ACL2-CMR"), Some(IndexOutcome::Skipped { .. })));
    assert_eq!(graph.vertices_with_label("acl").len(), 1);
    assert_eq!(graph.edges_with_label("hasAccessTo").len(), 1);
    assert_eq!(graph.edges_with_label("accessControlledBy").len(), 1);
}

#[tokio::test]
async fn test_harvest_acls_listing_failure_is_empty_report() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/access-control/acls"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let graph = Arc::new(MemoryGraph::new());
    let report = local_indexer(&server, graph.clone())
        .harvest_acls()
        .await
        .unwrap();

    assert!(report.outcomes.is_empty());
    assert_eq!(graph.operation_count(), 0);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_reindexing_campaigns_is_idempotent(
        names in prop::collection::vec("[A-Za-z0-9]{1,8}", 1..12)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let graph = MemoryGraph::new();

        runtime.block_on(async {
            let parent = parent_dataset(&graph, "C1-PROV").await;
            let indexer = RelationshipIndexer::new(&graph);
            for name in names.iter().chain(names.iter()) {
                indexer
                    .index(&schema::CAMPAIGN, &RelatedRecord::new(name.as_str()), &parent)
                    .await;
            }
        });

        let distinct: std::collections::BTreeSet<_> = names.iter().collect();
        prop_assert_eq!(graph.vertices_with_label("campaign").len(), distinct.len());
        prop_assert_eq!(graph.edges_with_label("includedIn").len(), distinct.len());
    }

    #[test]
    fn prop_relation_direction_orients_edge(inward in any::<bool>()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let graph = MemoryGraph::new();
        let relation = Relation {
            direction: if inward { Direction::In } else { Direction::Out },
            ..schema::CAMPAIGN
        };

        let (parent, outcome) = runtime.block_on(async {
            let parent = parent_dataset(&graph, "C1-PROV").await;
            let outcome = RelationshipIndexer::new(&graph)
                .index(&relation, &RelatedRecord::new("X"), &parent)
                .await;
            (parent, outcome)
        });

        let edge = &graph.edges_with_label("includedIn")[0];
        let related = outcome.vertex().cloned().unwrap();
        if inward {
            prop_assert_eq!((&edge.from, &edge.to), (&related, &parent));
        } else {
            prop_assert_eq!((&edge.from, &edge.to), (&parent, &related));
        }
    }
}
