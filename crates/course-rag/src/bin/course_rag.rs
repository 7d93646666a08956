//! Command-line front end for the course knowledge pipeline
//!
//! Run with: cargo run -p course-rag -- ingest --tenant prof_a notes/

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use course_rag::{IngestMode, IngestRequest, KnowledgeService, RagConfig};

#[derive(Parser, Debug)]
#[command(
    name = "course-rag",
    version,
    about = "Classify course materials into topic indices and retrieve scoped context"
)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true, env = "COURSE_RAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest files or directories for a tenant and print the outcome as JSON
    Ingest {
        /// Tenant (instructor) identifier
        #[arg(long)]
        tenant: String,

        /// Merge into the existing index instead of rebuilding it
        #[arg(long, default_value_t = false)]
        update: bool,

        /// Course material files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Retrieve passages for a query within one category
    Query {
        #[arg(long)]
        tenant: String,

        /// Category name from the taxonomy
        #[arg(long)]
        category: String,

        /// Number of passages to return
        #[arg(long)]
        k: Option<usize>,

        /// Minimum cosine similarity
        #[arg(long)]
        threshold: Option<f32>,

        query: String,
    },

    /// Retrieve context across categories picked from the query
    Context {
        #[arg(long)]
        tenant: String,

        /// Restrict to these categories (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,

        query: String,
    },

    /// Show a tenant's index
    Stats {
        #[arg(long)]
        tenant: String,
    },

    /// List taxonomy categories
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course_rag=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RagConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RagConfig::default(),
    };

    if let Command::Categories = cli.command {
        for category in &config.taxonomy.categories {
            println!("{}\t{}", category.name, category.description);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let service = KnowledgeService::new(config).context("failed to start knowledge service")?;

    match cli.command {
        Command::Ingest {
            tenant,
            update,
            paths,
        } => {
            if !service.health_check().await.unwrap_or(false) {
                tracing::warn!(
                    "Embedding backend {} is not responding",
                    service.embedding_backend()
                );
            }

            let mode = if update {
                IngestMode::Update
            } else {
                IngestMode::Fresh
            };
            let outcome = service
                .ingest(&IngestRequest::new(tenant, paths, mode))
                .await;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Query {
            tenant,
            category,
            k,
            threshold,
            query,
        } => {
            let mut request = service.request(&tenant, &query, &category);
            if let Some(k) = k {
                request = request.with_k(k);
            }
            if let Some(threshold) = threshold {
                if !(-1.0..=1.0).contains(&threshold) {
                    bail!("--threshold must lie in [-1, 1]");
                }
                request = request.with_score_threshold(threshold);
            }

            let passages = service.retrieve_scored(&request).await?;
            println!("{}", serde_json::to_string_pretty(&passages)?);
        }
        Command::Context {
            tenant,
            categories,
            query,
        } => {
            let categories = (!categories.is_empty()).then_some(categories.as_slice());
            let context = service.retrieve_context(&tenant, &query, categories).await?;

            if context.is_empty() {
                println!("No relevant context found.");
            } else {
                println!("{}", context.join("\n\n"));
            }
        }
        Command::Stats { tenant } => match service.index_summary(&tenant).await? {
            Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
            None => {
                eprintln!("No index for tenant {}", tenant);
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Categories => {}
    }

    Ok(ExitCode::SUCCESS)
}
