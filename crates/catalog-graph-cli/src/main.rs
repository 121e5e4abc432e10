//! Catalog Graph CLI
//!
//! One-shot entry point for:
//! - Indexing or deleting a single collection / ACL
//! - Replaying a concept change event (`{"action": ..., "concept-id": ...}`)
//! - Harvesting every collection of the catalog through a scrolled search
//! - Harvesting every catalog item ACL through the paged ACL listing
//! - Releasing a scroll session left behind by an interrupted harvest

use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::{self, Read};
use std::sync::Arc;

use catalog_graph_indexer::{BatchReport, ConceptEvent, IndexOutcome, Indexer, IndexerConfig};
use catalog_graph_store::{GraphStore, GremlinClient, GremlinConfig, MemoryGraph};
use catalog_graph_upstream::{CatalogClient, EnvSecretStore, SecretStore, TokenProvider, UpstreamConfig};

#[derive(Parser)]
#[command(name = "catalog-graph")]
#[command(author, version, about = "Index catalog collections and ACLs into a property graph")]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

/// Every flag stands in for an environment variable of the same setting.
/// Flags win; unset flags fall back to the environment, and both are parsed
/// by the same loaders.
#[derive(Args)]
struct Settings {
    /// Catalog root URL [env: CMR_ROOT]
    #[arg(long, global = true)]
    catalog_root: Option<String>,

    /// Deployment environment, first segment of the token path [env: ENVIRONMENT]
    #[arg(long, global = true)]
    environment: Option<String>,

    /// Parameter name of the catalog token [env: CMR_TOKEN_KEY]
    #[arg(long, global = true)]
    token_key: Option<String>,

    /// Skip token lookup entirely [env: IS_LOCAL=true]
    #[arg(long, global = true)]
    local: bool,

    /// [env: PAGE_SIZE]
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// [env: CMR_TIMEOUT_SECS]
    #[arg(long, global = true)]
    catalog_timeout_secs: Option<u64>,

    /// Gremlin server endpoint. Without one, an in-memory graph is used [env: GREMLIN_URL]
    #[arg(long, global = true)]
    gremlin_url: Option<String>,

    /// [env: GREMLIN_TIMEOUT_SECS]
    #[arg(long, global = true)]
    gremlin_timeout_secs: Option<u64>,

    /// Entities indexed at once during a harvest [env: INDEX_CONCURRENCY]
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Where the catalog token is read from.
    #[arg(long, value_enum, global = true, default_value_t = SecretSource::Env)]
    secrets: SecretSource,
}

impl Settings {
    /// The flag standing in for `key`, if given.
    fn flag(&self, key: &str) -> Option<String> {
        match key {
            "CMR_ROOT" => self.catalog_root.clone(),
            "ENVIRONMENT" => self.environment.clone(),
            "CMR_TOKEN_KEY" => self.token_key.clone(),
            "IS_LOCAL" => self.local.then(|| "true".to_string()),
            "PAGE_SIZE" => self.page_size.map(|v| v.to_string()),
            "CMR_TIMEOUT_SECS" => self.catalog_timeout_secs.map(|v| v.to_string()),
            "GREMLIN_URL" => self.gremlin_url.clone(),
            "GREMLIN_TIMEOUT_SECS" => self.gremlin_timeout_secs.map(|v| v.to_string()),
            "INDEX_CONCURRENCY" => self.concurrency.map(|v| v.to_string()),
            _ => None,
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.flag(key).or_else(|| std::env::var(key).ok())
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SecretSource {
    /// Environment variable derived from the token path.
    Env,
    /// AWS SSM Parameter Store (requires the `aws` feature).
    Ssm,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a collection and index it with its campaigns, links and instruments.
    IndexCollection { concept_id: String },

    /// Fetch an ACL and replace its vertex, groups and access edges.
    IndexAcl { concept_id: String },

    /// Remove a dataset and the neighbours only it referenced.
    DeleteCollection { concept_id: String },

    /// Remove an acl vertex; groups are kept.
    DeleteAcl { concept_id: String },

    /// Handle one concept change event. Pass `-` to read it from stdin.
    Event { json: String },

    /// Page through all collections and index each one.
    Harvest {
        #[arg(long)]
        provider: Option<String>,
    },

    /// List every catalog item ACL and index each one.
    HarvestAcls,

    /// Release a catalog scroll session.
    ClearScroll { scroll_id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings;
    let lookup = |key: &str| settings.lookup(key);
    let upstream = UpstreamConfig::from_lookup(lookup)?;
    let catalog = CatalogClient::new(upstream.clone())?;

    if let Commands::ClearScroll { scroll_id } = &cli.command {
        return match catalog.clear_scroll_session(Some(scroll_id.as_str())).await {
            Some(status) => {
                println!("{} {} (status {status})", "released".green().bold(), scroll_id);
                Ok(())
            }
            None => bail!("scroll session {scroll_id} could not be released"),
        };
    }

    let tokens = TokenProvider::new(secret_store(settings.secrets).await?, &upstream);
    let backend = Backend::open(GremlinConfig::from_lookup(lookup)?)?;
    let indexer = Indexer::new(
        backend.store(),
        catalog,
        tokens,
        IndexerConfig::from_lookup(lookup)?,
    );

    let result = match cli.command {
        Commands::IndexCollection { concept_id } => {
            let outcome = indexer.index_collection(&concept_id).await?;
            report_outcome(&concept_id, &outcome)
        }
        Commands::IndexAcl { concept_id } => {
            let outcome = indexer.index_acl(&concept_id).await?;
            report_outcome(&concept_id, &outcome)
        }
        Commands::DeleteCollection { concept_id } => {
            let outcome = indexer.delete_collection(&concept_id).await;
            report_outcome(&concept_id, &outcome)
        }
        Commands::DeleteAcl { concept_id } => {
            let outcome = indexer.delete_acl(&concept_id).await;
            report_outcome(&concept_id, &outcome)
        }
        Commands::Event { json } => {
            let event = parse_event(&json)?;
            let outcome = indexer.handle_event(&event).await?;
            report_outcome(&event.concept_id, &outcome)
        }
        Commands::Harvest { provider } => {
            let report = indexer.harvest(provider.as_deref()).await?;
            report_batch(&report)
        }
        Commands::HarvestAcls => {
            let report = indexer.harvest_acls().await?;
            report_batch(&report)
        }
        Commands::ClearScroll { .. } => Ok(()),
    };

    drop(indexer);
    backend.close();
    result
}

// ============================================================================
// Wiring
// ============================================================================

async fn secret_store(source: SecretSource) -> Result<Arc<dyn SecretStore>> {
    match source {
        SecretSource::Env => Ok(Arc::new(EnvSecretStore)),
        #[cfg(feature = "aws")]
        SecretSource::Ssm => Ok(Arc::new(
            catalog_graph_upstream::SsmSecretStore::from_env().await,
        )),
        #[cfg(not(feature = "aws"))]
        SecretSource::Ssm => bail!("SSM secrets need a build with the `aws` feature"),
    }
}

enum Backend {
    Gremlin(Arc<GremlinClient>),
    Memory(Arc<MemoryGraph>),
}

impl Backend {
    fn open(gremlin: Option<GremlinConfig>) -> Result<Self> {
        match gremlin {
            Some(config) => Ok(Backend::Gremlin(Arc::new(GremlinClient::connect(config)?))),
            None => {
                eprintln!(
                    "{} no Gremlin endpoint configured, writing to an in-memory graph",
                    "note:".yellow().bold()
                );
                Ok(Backend::Memory(Arc::new(MemoryGraph::new())))
            }
        }
    }

    fn store(&self) -> Arc<dyn GraphStore> {
        match self {
            Backend::Gremlin(client) => client.clone() as Arc<dyn GraphStore>,
            Backend::Memory(graph) => graph.clone() as Arc<dyn GraphStore>,
        }
    }

    fn close(self) {
        match self {
            Backend::Gremlin(client) => match Arc::try_unwrap(client) {
                Ok(client) => client.close(),
                Err(_) => tracing::warn!("gremlin client still shared at shutdown"),
            },
            Backend::Memory(graph) => {
                eprintln!(
                    "{} {} vertices, {} edges",
                    "memory graph:".bold(),
                    graph.vertex_count(),
                    graph.edge_count()
                );
            }
        }
    }
}

fn parse_event(raw: &str) -> Result<ConceptEvent> {
    let text = if raw == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        raw.to_string()
    };
    serde_json::from_str(&text).map_err(|e| anyhow!("invalid concept event: {e}"))
}

// ============================================================================
// Output
// ============================================================================

fn report_outcome(concept_id: &str, outcome: &IndexOutcome) -> Result<()> {
    print_outcome(concept_id, outcome);
    if outcome.is_failure() {
        bail!("indexing {concept_id} failed");
    }
    Ok(())
}

fn print_outcome(concept_id: &str, outcome: &IndexOutcome) {
    match outcome {
        IndexOutcome::Indexed {
            vertex,
            edges,
            related_failures,
        } => {
            let line = format!(
                "{concept_id} vertex={vertex} edges={} related_failures={related_failures}",
                edges.len()
            );
            if *related_failures > 0 {
                println!("{} {}", "indexed".yellow().bold(), line);
            } else {
                println!("{} {}", "indexed".green().bold(), line);
            }
        }
        IndexOutcome::Deleted { vertices } => {
            println!("{} {concept_id} vertices={vertices}", "deleted".green().bold());
        }
        IndexOutcome::Skipped { reason } => {
            println!("{} {concept_id}: {reason}", "skipped".yellow());
        }
        IndexOutcome::Failed { cause } => {
            println!("{} {concept_id}: {cause}", "failed".red().bold());
        }
    }
}

fn report_batch(report: &BatchReport) -> Result<()> {
    for (concept_id, outcome) in &report.outcomes {
        print_outcome(concept_id, outcome);
    }
    println!(
        "{} {} succeeded, {} skipped, {} failed",
        "harvest:".bold(),
        report.succeeded().to_string().green(),
        report.skipped().to_string().yellow(),
        report.failed().to_string().red()
    );
    if report.failed() > 0 {
        bail!("{} entities failed to index", report.failed());
    }
    Ok(())
}
