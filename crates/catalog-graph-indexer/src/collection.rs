//! Collection records → dataset vertex plus campaign, related URL and
//! platform/instrument neighbours.

use crate::outcome::IndexOutcome;
use crate::relationship::{RelatedRecord, RelationshipIndexer};
use crate::schema::{self, Relation};
use catalog_graph_store::{upsert_vertex, GraphStore, VertexKey, VertexSpec};
use catalog_graph_upstream::CollectionRecord;

const DOI_RESOLVER: &str = "https://dx.doi.org";
const NOT_PROVIDED: &str = "Not provided";

pub struct CollectionIndexer<'a> {
    graph: &'a dyn GraphStore,
    catalog_root: &'a str,
}

impl<'a> CollectionIndexer<'a> {
    /// `catalog_root` is used to build landing page links for collections
    /// without a DOI.
    pub fn new(graph: &'a dyn GraphStore, catalog_root: &'a str) -> Self {
        Self {
            graph,
            catalog_root: catalog_root.trim_end_matches('/'),
        }
    }

    pub async fn index(&self, record: &CollectionRecord) -> IndexOutcome {
        let concept_id = record.meta.concept_id.as_str();
        let spec = dataset_spec(record, self.catalog_root);

        let dataset = match upsert_vertex(self.graph, &spec).await {
            Ok(id) => id,
            Err(failure) => {
                tracing::error!(concept_id, error = %failure, "failed to index dataset");
                return IndexOutcome::failed(failure);
            }
        };

        let relationships = RelationshipIndexer::new(self.graph);
        let mut edges = Vec::new();
        let mut related_failures = 0usize;

        for (relation, related) in related_records(record) {
            let Some(related) = related else {
                tracing::warn!(
                    concept_id,
                    label = relation.label,
                    "related entry has no {}, skipped",
                    relation.key_property
                );
                related_failures += 1;
                continue;
            };
            match relationships.index(&relation, &related, &dataset).await {
                IndexOutcome::Indexed { edges: mut e, .. } => edges.append(&mut e),
                _ => related_failures += 1,
            }
        }

        tracing::info!(
            concept_id,
            vertex = %dataset,
            edges = edges.len(),
            related_failures,
            "collection indexed"
        );
        IndexOutcome::Indexed {
            vertex: dataset,
            edges,
            related_failures,
        }
    }
}

/// Dataset vertex for a collection: created once, title/doi/name kept current.
pub fn dataset_spec(record: &CollectionRecord, catalog_root: &str) -> VertexSpec {
    let concept_id = record.meta.concept_id.as_str();
    let doi = record
        .umm
        .doi
        .as_ref()
        .and_then(|d| d.doi.as_deref())
        .filter(|d| !d.is_empty());

    let name = match doi {
        Some(doi) => {
            let suffix = doi.split_once(':').map(|(_, rest)| rest).unwrap_or(doi);
            format!("{DOI_RESOLVER}/{suffix}")
        }
        None => format!(
            "{}/concepts/{concept_id}.html",
            catalog_root.trim_end_matches('/')
        ),
    };

    VertexSpec::new(VertexKey::new(schema::DATASET, schema::CONCEPT_ID, concept_id))
        .refresh("title", record.umm.entry_title.as_deref().unwrap_or(NOT_PROVIDED))
        .refresh("doi", doi.unwrap_or(NOT_PROVIDED))
        .refresh("name", name)
}

/// Related entries in record order. `None` marks an entry missing its key.
fn related_records(record: &CollectionRecord) -> Vec<(Relation, Option<RelatedRecord>)> {
    let umm = &record.umm;
    let mut out = Vec::new();

    for project in &umm.projects {
        let related = non_empty(project.short_name.as_deref())
            .map(|name| RelatedRecord::new(name).optional("longName", project.long_name.as_deref()));
        out.push((schema::CAMPAIGN, related));
    }

    for link in &umm.related_urls {
        let related = non_empty(link.url.as_deref()).map(|url| {
            RelatedRecord::new(url)
                .optional("type", link.kind.as_deref())
                .optional("subtype", link.subtype.as_deref())
                .optional("description", link.description.as_deref())
        });
        out.push((schema::RELATED_URL, related));
    }

    for platform in &umm.platforms {
        let Some(platform_name) = non_empty(platform.short_name.as_deref()) else {
            out.push((schema::PLATFORM_INSTRUMENT, None));
            continue;
        };
        let instruments: Vec<&str> = platform
            .instruments
            .iter()
            .filter_map(|i| non_empty(i.short_name.as_deref()))
            .collect();

        if instruments.is_empty() {
            out.push((
                schema::PLATFORM_INSTRUMENT,
                Some(RelatedRecord::new(platform_name).property("platform", platform_name)),
            ));
        }
        for instrument in instruments {
            out.push((
                schema::PLATFORM_INSTRUMENT,
                Some(
                    RelatedRecord::new(format!("{platform_name}/{instrument}"))
                        .property("platform", platform_name)
                        .property("instrument", instrument),
                ),
            ));
        }
    }

    out
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
