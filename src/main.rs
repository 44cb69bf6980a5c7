mod doctor;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowstack_core::config::{dirs_home, AppConfig};
use flowstack_core::traits::EmbeddingProvider;
use flowstack_core::{Metadata, SearchScope, Workflow, WorkflowDraft};
use flowstack_engine::{
    ExecutionResponse, Providers, ValidationReport, Validator, WorkflowRunner,
};
use flowstack_llm::ProviderRouter;
use flowstack_memory::{split_passages, EmbeddingRouter, SqliteVectorStore};

#[derive(Parser)]
#[command(name = "flowstack", version, about = "Run retrieval-augmented LLM workflows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "flowstack.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow definition without running it
    Validate {
        /// Workflow definition (JSON)
        workflow: PathBuf,
    },
    /// Execute a workflow against a query
    Run {
        /// Workflow definition (JSON)
        workflow: PathBuf,
        /// The query; read from stdin when omitted
        query: Vec<String>,
        /// Abort the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Embed documents into a knowledge base
    Ingest {
        /// Label of the knowledgebase component the passages belong to
        #[arg(long)]
        knowledgebase: String,
        /// Collection name configured on that component
        #[arg(long, default_value = "documents")]
        collection: String,
        /// Embedding provider
        #[arg(long, default_value = "openai")]
        provider: String,
        /// Embedding model (provider default when omitted)
        #[arg(long)]
        model: Option<String>,
        /// Text files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show current configuration
    Config,
    /// Run system health checks
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flowstack=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Validate { workflow } => {
            let report = match Workflow::assemble("cli", read_draft(&workflow)?) {
                Ok(wf) => Validator::new(&config.engine).report(&wf),
                Err(e) => ValidationReport {
                    valid: false,
                    error: Some(e.to_string()),
                },
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.valid {
                std::process::exit(1);
            }
        }
        Commands::Run {
            workflow,
            query,
            timeout_secs,
        } => {
            let draft = read_draft(&workflow)?;
            let query = if query.is_empty() {
                read_stdin()
            } else {
                query.join(" ")
            };
            let runner = build_runner(&config)?;

            let response = match timeout_secs {
                Some(secs) => {
                    match tokio::time::timeout(
                        Duration::from_secs(secs),
                        runner.execute_draft(&draft, &query),
                    )
                    .await
                    {
                        Ok(outcome) => ExecutionResponse::from(outcome),
                        Err(_) => {
                            warn!(timeout_secs = secs, "Workflow execution timed out");
                            ExecutionResponse {
                                success: false,
                                response: None,
                                metadata: None,
                                error: Some(format!("execution timed out after {}s", secs)),
                                error_kind: None,
                            }
                        }
                    }
                }
                None => ExecutionResponse::from(runner.execute_draft(&draft, &query).await),
            };

            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }
        Commands::Ingest {
            knowledgebase,
            collection,
            provider,
            model,
            files,
        } => {
            let embedder = EmbeddingRouter::from_config(&config);
            let store = SqliteVectorStore::open(&config.vector_store_path())?;
            let scope = SearchScope::new(collection, knowledgebase);

            for file in &files {
                let text = std::fs::read_to_string(file)?;
                let passages = split_passages(&text);
                if passages.is_empty() {
                    warn!(file = %file.display(), "No passages found, skipping");
                    continue;
                }

                let vectors = embedder
                    .embed(&passages, &provider, model.as_deref())
                    .await?;
                let mut source = Metadata::new();
                source.insert(
                    "source".to_string(),
                    serde_json::Value::String(file.display().to_string()),
                );
                let metadatas = vec![source; passages.len()];
                let ids = store.add_passages(&scope, &passages, &vectors, Some(&metadatas))?;

                info!(file = %file.display(), scope = %scope.name(), passages = ids.len(), "Ingested");
                println!("{}: {} passages -> {}", file.display(), ids.len(), scope.name());
            }
            println!("{} now holds {} passages", scope.name(), store.count(&scope)?);
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
        }
        Commands::Doctor => {
            println!("Flowstack Doctor");
            println!("================");
            doctor::run_doctor(&config);
        }
    }

    Ok(())
}

/// The given path, else `~/.flowstack/config.toml`, else defaults plus
/// environment credentials.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }

    if let Some(home_config) = dirs_home().map(|h| h.join(".flowstack").join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }

    let mut config = AppConfig::default();
    config.apply_env_fallbacks();
    Ok(config)
}

fn read_draft(path: &Path) -> anyhow::Result<WorkflowDraft> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)?)
}

fn read_stdin() -> String {
    io::stdin()
        .lock()
        .lines()
        .map_while(|l| l.ok())
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_runner(config: &AppConfig) -> anyhow::Result<WorkflowRunner> {
    let store = SqliteVectorStore::open(&config.vector_store_path())?;
    let mut providers = Providers::new(
        Arc::new(EmbeddingRouter::from_config(config)),
        Arc::new(store),
        Arc::new(ProviderRouter::from_config(config)),
    );

    if let Some(ws_config) = &config.web_search {
        match flowstack_tools::create_web_search(ws_config) {
            Ok(search) => {
                info!(provider = %ws_config.provider, "Web search enabled");
                providers = providers.with_web_search(search);
            }
            Err(e) => warn!(error = %e, "Web search disabled"),
        }
    }

    Ok(WorkflowRunner::new(providers, &config.engine))
}
