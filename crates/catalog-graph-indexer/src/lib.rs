//! Catalog Graph Indexer: catalog records → property graph
//!
//! ```text
//! ConceptEvent ──► Indexer ──► TokenProvider ──► CatalogClient (fetch)
//!                     │
//!                     ├─► CollectionIndexer ─► RelationshipIndexer ─┐
//!                     ├─► AclIndexer ───────► ReplaceIndexer ───────┼─► GraphStore
//!                     └─► delete_collection / delete_acl ───────────┘
//! ```
//!
//! Every entity ends in an [`IndexOutcome`]. Graph and fetch failures stay
//! inside the outcome; only [`TokenError`] is returned as an error because
//! no authenticated read can work without a token.

pub mod acl;
pub mod collection;
pub mod delete;
pub mod event;
pub mod outcome;
pub mod relationship;
pub mod replace;
pub mod schema;

#[cfg(test)]
mod tests;

use catalog_graph_store::GraphStore;
use catalog_graph_upstream::{
    parse_var, CatalogClient, ConfigError, Credential, TokenError, TokenProvider,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;

pub use acl::AclIndexer;
pub use collection::{dataset_spec, CollectionIndexer};
pub use event::{ConceptAction, ConceptEvent, ConceptType};
pub use outcome::{BatchReport, IndexOutcome};
pub use relationship::{RelatedRecord, RelationshipIndexer};
pub use replace::{ReplaceIndexer, ReplaceOutcome, ReplaceState};
pub use schema::Relation;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Entities indexed at once by a batch.
    pub concurrency: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl IndexerConfig {
    /// Load `INDEX_CONCURRENCY` (default 8) through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        match parse_var(var, "INDEX_CONCURRENCY")? {
            Some(concurrency) => Self::default().with_concurrency(concurrency),
            None => Ok(Self::default()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, ConfigError> {
        if concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        self.concurrency = concurrency;
        Ok(self)
    }
}

// ============================================================================
// Per-key serialization
// ============================================================================

/// Async locks keyed by natural key, so two replaces of the same acl inside
/// this process never interleave. Idle entries are pruned on each acquire.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

// ============================================================================
// Indexer
// ============================================================================

/// Shared handle over the graph, the catalog and the token provider.
/// Cloning is cheap; clones share the same per-key locks.
#[derive(Clone)]
pub struct Indexer {
    graph: Arc<dyn GraphStore>,
    catalog: Arc<CatalogClient>,
    tokens: Arc<TokenProvider>,
    config: IndexerConfig,
    locks: Arc<KeyLocks>,
}

impl Indexer {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        catalog: CatalogClient,
        tokens: TokenProvider,
        config: IndexerConfig,
    ) -> Self {
        Self {
            graph,
            catalog: Arc::new(catalog),
            tokens: Arc::new(tokens),
            config,
            locks: Arc::new(KeyLocks::default()),
        }
    }

    pub fn graph(&self) -> &dyn GraphStore {
        self.graph.as_ref()
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    pub async fn handle_event(&self, event: &ConceptEvent) -> Result<IndexOutcome, TokenError> {
        let concept_id = event.concept_id.as_str();
        tracing::info!(concept_id, action = ?event.action, "handling concept event");

        match (event.action, event.concept_type()) {
            (ConceptAction::Unsupported, _) => Ok(IndexOutcome::skipped("unsupported action")),
            (_, ConceptType::Other) => Ok(IndexOutcome::skipped(format!(
                "unsupported concept type for {concept_id}"
            ))),
            (ConceptAction::ConceptUpdate, ConceptType::Collection) => {
                self.index_collection(concept_id).await
            }
            (ConceptAction::ConceptUpdate, ConceptType::Acl) => self.index_acl(concept_id).await,
            (ConceptAction::ConceptDelete, ConceptType::Collection) => {
                Ok(self.delete_collection(concept_id).await)
            }
            (ConceptAction::ConceptDelete, ConceptType::Acl) => Ok(self.delete_acl(concept_id).await),
        }
    }

    pub async fn index_collection(&self, concept_id: &str) -> Result<IndexOutcome, TokenError> {
        let token = self.tokens.get_token().await?;
        Ok(self.index_collection_with(concept_id, token.as_ref()).await)
    }

    pub async fn index_acl(&self, concept_id: &str) -> Result<IndexOutcome, TokenError> {
        let token = self.tokens.get_token().await?;
        Ok(self.index_acl_with(concept_id, token.as_ref()).await)
    }

    pub async fn delete_collection(&self, concept_id: &str) -> IndexOutcome {
        let _guard = self.locks.acquire(lock_key(schema::DATASET, concept_id)).await;
        delete::delete_collection(self.graph.as_ref(), concept_id).await
    }

    pub async fn delete_acl(&self, concept_id: &str) -> IndexOutcome {
        let _guard = self.locks.acquire(lock_key(schema::ACL, concept_id)).await;
        delete::delete_acl(self.graph.as_ref(), concept_id).await
    }

    /// Index many concepts with one token, at most `concurrency` at a time.
    /// Outcomes come back in input order.
    pub async fn index_batch(&self, concept_ids: Vec<String>) -> Result<BatchReport, TokenError> {
        let token = self.tokens.get_token().await?;
        Ok(self.index_batch_with(concept_ids, token).await)
    }

    /// Page through the catalog's collections and index each one.
    pub async fn harvest(&self, provider: Option<&str>) -> Result<BatchReport, TokenError> {
        let token = self.tokens.get_token().await?;
        let concept_ids = match self
            .catalog
            .harvest_collection_ids(token.as_ref(), provider)
            .await
        {
            Ok(ids) => ids,
            Err(error) => {
                tracing::warn!(?provider, %error, "collection harvest failed");
                return Ok(BatchReport::default());
            }
        };
        tracing::info!(?provider, collections = concept_ids.len(), "harvested collection ids");
        Ok(self.index_batch_with(concept_ids, token).await)
    }

    /// List every catalog item acl and index each one.
    pub async fn harvest_acls(&self) -> Result<BatchReport, TokenError> {
        let token = self.tokens.get_token().await?;
        let concept_ids = match self.catalog.harvest_acl_ids(token.as_ref()).await {
            Ok(ids) => ids,
            Err(error) => {
                tracing::warn!(%error, "acl harvest failed");
                return Ok(BatchReport::default());
            }
        };
        tracing::info!(acls = concept_ids.len(), "harvested acl ids");
        Ok(self.index_batch_with(concept_ids, token).await)
    }

    async fn index_batch_with(
        &self,
        concept_ids: Vec<String>,
        token: Option<Credential>,
    ) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut slots: Vec<(String, Option<IndexOutcome>)> =
            concept_ids.iter().map(|id| (id.clone(), None)).collect();

        let mut tasks = JoinSet::new();
        for (position, concept_id) in concept_ids.into_iter().enumerate() {
            let indexer = self.clone();
            let token = token.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = indexer.index_concept(&concept_id, token.as_ref()).await;
                (position, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, outcome)) => slots[position].1 = Some(outcome),
                Err(error) => tracing::error!(%error, "indexing task aborted"),
            }
        }

        let report = BatchReport {
            outcomes: slots
                .into_iter()
                .map(|(id, outcome)| {
                    (
                        id,
                        outcome.unwrap_or_else(|| IndexOutcome::failed("indexing task aborted")),
                    )
                })
                .collect(),
        };
        tracing::info!(
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "batch indexed"
        );
        report
    }

    async fn index_concept(&self, concept_id: &str, token: Option<&Credential>) -> IndexOutcome {
        match ConceptType::of(concept_id) {
            ConceptType::Collection => self.index_collection_with(concept_id, token).await,
            ConceptType::Acl => self.index_acl_with(concept_id, token).await,
            ConceptType::Other => {
                IndexOutcome::skipped(format!("unsupported concept type for {concept_id}"))
            }
        }
    }

    async fn index_collection_with(
        &self,
        concept_id: &str,
        token: Option<&Credential>,
    ) -> IndexOutcome {
        let _guard = self.locks.acquire(lock_key(schema::DATASET, concept_id)).await;
        let Some(record) = self.catalog.fetch_collection(concept_id, token).await else {
            tracing::info!(concept_id, "collection not available from catalog");
            return IndexOutcome::skipped("collection not available from catalog");
        };
        let root = self.catalog.config().catalog_root.as_str();
        CollectionIndexer::new(self.graph.as_ref(), root)
            .index(&record)
            .await
    }

    async fn index_acl_with(&self, concept_id: &str, token: Option<&Credential>) -> IndexOutcome {
        let _guard = self.locks.acquire(lock_key(schema::ACL, concept_id)).await;
        let Some(record) = self.catalog.fetch_acl(concept_id, token).await else {
            tracing::info!(concept_id, "acl not available from catalog");
            return IndexOutcome::skipped("acl not available from catalog");
        };
        AclIndexer::new(self.graph.as_ref()).index(concept_id, &record).await
    }
}

fn lock_key(label: &str, concept_id: &str) -> String {
    format!("{label}:{concept_id}")
}
