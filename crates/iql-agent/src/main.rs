//! IQL agent CLI
//!
//! Turns a natural language question into validated IQL using OpenAI and a
//! catalog described in YAML, and prints the outcome as JSON.

use clap::{Parser, ValueEnum};
use iql_agent::{load_contexts, logging, CatalogFile, Config, OpenAiClient, RetryController};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Filter,
    Aggregation,
}

#[derive(Debug, Parser)]
#[command(name = "iql-agent", version, about = "Generate validated IQL from natural language")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// YAML file describing the exposed functions (and optionally contexts)
    #[arg(long)]
    catalog: PathBuf,

    /// Extra YAML file with a list of contexts
    #[arg(long)]
    contexts: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = ModeArg::Filter)]
    mode: ModeArg,

    /// Override the configured retry budget
    #[arg(long)]
    retries: Option<usize>,

    /// Question to translate
    question: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(retries) = cli.retries {
        config.agent.n_retries = retries;
    }
    config.apply_logging_env();
    logging::init();

    let (catalog, mut contexts) = CatalogFile::load(&cli.catalog)?.into_parts()?;
    if let Some(path) = &cli.contexts {
        contexts.extend(load_contexts(path)?);
    }
    info!(
        functions = catalog.functions().len(),
        contexts = contexts.len(),
        "Catalog loaded"
    );

    let api_key = Config::get_openai_api_key()?;
    let client = OpenAiClient::new(api_key, &config.llm.model, config.llm.temperature);
    info!(model = client.model(), "Using OpenAI model");

    let controller = RetryController::new(client, config.agent.clone());
    let output = match cli.mode {
        ModeArg::Filter => {
            let generation = controller.generate_filter(&cli.question, &catalog, &contexts).await?;
            serde_json::to_string_pretty(&generation)?
        }
        ModeArg::Aggregation => {
            let generation = controller
                .generate_aggregation(&cli.question, &catalog, &contexts)
                .await?;
            serde_json::to_string_pretty(&generation)?
        }
    };
    println!("{}", output);

    Ok(())
}
