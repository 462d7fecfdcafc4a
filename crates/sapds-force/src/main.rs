//! CLI entry point for Force Element graph and tree queries.
//!
//! Writes JSON results to stdout; logs go to stderr.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use sapds_core::config::AppConfig;
use sapds_core::types::HierarchyType;
use sapds_force::{ChildrenRequest, ForceElementClient, GraphRequest, SubgraphRequest, TreeRequest};
use sapds_odata::ODataSession;

#[derive(Parser)]
#[command(name = "force-elements")]
#[command(about = "Force Element graph traversal and tree building over SAP OData")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Override the configured sap-client.
    #[arg(long, global = true)]
    sap_client: Option<String>,

    /// Config file prefix (default: sapds).
    #[arg(short, long, default_value = "sapds", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Expand the network graph around a root.
    Graph {
        root_id: String,
        #[arg(long)]
        depth: Option<usize>,
        /// Relation codes to keep (repeatable).
        #[arg(long = "rel")]
        rel_types: Vec<String>,
        /// Skip name resolution.
        #[arg(long)]
        no_names: bool,
    },
    /// Build the structural tree under a root.
    Tree {
        root_id: String,
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long)]
        readiness: bool,
        #[arg(long)]
        sidc: bool,
    },
    /// List direct children of one or more parents.
    Children {
        #[arg(required = true)]
        parent_ids: Vec<String>,
        /// structure, peacetime, wartime, operation, or exercise.
        #[arg(long, default_value = "structure")]
        hierarchy: String,
    },
    /// Slice a neighborhood out of an edge list (reads JSON from stdin).
    Subgraph,
    /// Resolve display names.
    Names {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Readiness KPIs and status.
    Readiness {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Military symbol codes.
    Sidc {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Report which field carries symbol codes.
    ProbeSidc,
    /// List entity sets of both services.
    EntitySets,
    /// List properties of an entity set (logical names accepted).
    Fields { entity_set: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)?;
    let session = ODataSession::connect(&config.odata)?;
    let client = ForceElementClient::with_sap_client(Arc::new(session), config.force, cli.sap_client);

    match cli.command {
        Command::Graph {
            root_id,
            depth,
            rel_types,
            no_names,
        } => {
            let mut request = GraphRequest::new(root_id).with_names(!no_names);
            request.depth = depth;
            if !rel_types.is_empty() {
                request = request.with_rel_types(rel_types);
            }
            let result = client.get_graph(request).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Tree {
            root_id,
            depth,
            readiness,
            sidc,
        } => {
            let mut request = TreeRequest::new(root_id)
                .with_readiness(readiness)
                .with_sidc(sidc);
            request.depth = depth;
            let result = client.get_tree(request).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Children {
            parent_ids,
            hierarchy,
        } => {
            let request = ChildrenRequest::new(parent_ids)
                .with_hierarchy(HierarchyType::parse_or_default(&hierarchy));
            let result = client.get_children(request).await;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Subgraph => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let request: SubgraphRequest = serde_json::from_str(&input)?;
            let result = client.get_subgraph(&request.focus_id, &request.edges, request.depth)?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Names { ids } => {
            let result = client.get_names(&ids).await;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Readiness { ids } => {
            let result = client.get_readiness(&ids).await;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Sidc { ids } => {
            let result = client.get_sidcs(&ids).await;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::ProbeSidc => {
            let result = client.probe_sidc_field().await;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::EntitySets => {
            let result = client.list_entity_sets().await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Fields { ref entity_set } => {
            let result = client.list_fields(entity_set).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    Ok(())
}
