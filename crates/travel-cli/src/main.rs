//! Travel chat CLI - Ask questions about travel-sample landmarks.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use travel_core::{DocumentStore, QueryParams, Result, TravelConfig};
use travel_embed::OnnxEmbedder;
use travel_query::{
    ChatInput, DualModeRetriever, LandmarkLoader, RetrieverConfig, TravelChatbot,
};
use travel_store::CapellaStore;

type Chatbot = TravelChatbot<DualModeRetriever<CapellaStore, OnnxEmbedder>>;

/// Travel chatbot over Couchbase Capella vector and keyword search
#[derive(Parser)]
#[command(name = "travel-chat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/travel-rag/config.toml, then ./travel-rag.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of candidates per search pass
    #[arg(long, global = true)]
    num_candidates: Option<usize>,

    /// Only use keyword search when vector search comes up short
    #[arg(long, global = true)]
    no_keyword_search: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question loop (default)
    Chat,

    /// Answer a single question
    Ask {
        /// The question
        question: String,
    },

    /// Create the vectors collection and embed every landmark
    Prepare {
        /// Regenerate embeddings even if some already exist
        #[arg(long)]
        regenerate: bool,
    },

    /// Check connectivity and show the number of stored vectors
    Status,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    info!("Endpoint: {}", config.capella.endpoint);
    info!("Username: {}", config.capella.username);
    info!("Password: {}", config.capella.masked_password());
    info!("Bucket: {}", config.capella.bucket);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let chatbot = build_chatbot(&config).await?;
            chat(&chatbot).await
        }
        Commands::Ask { question } => {
            let chatbot = build_chatbot(&config).await?;
            println!("{}", chatbot.answer_question(&question).await);
            Ok(())
        }
        Commands::Prepare { regenerate } => prepare(&config, regenerate).await,
        Commands::Status => status(&config).await,
    }
}

/// Load the config file, then environment and command-line overrides.
fn load_config(cli: &Cli) -> Result<TravelConfig> {
    let mut config = match &cli.config {
        Some(path) => TravelConfig::load(path)?,
        None => TravelConfig::load_default()?,
    };

    config.apply_env();

    if let Some(num_candidates) = cli.num_candidates {
        config.retrieval.num_candidates = num_candidates;
    }
    if cli.no_keyword_search {
        config.retrieval.keyword_search = false;
    }

    config.validate()?;
    Ok(config)
}

async fn connect(config: &TravelConfig) -> Result<Arc<CapellaStore>> {
    info!("Connecting to Couchbase Capella at {}...", config.capella.endpoint);
    let store = CapellaStore::connect(&config.capella).await?;
    info!("Connected to {}", store.query_url());
    Ok(Arc::new(store))
}

fn load_embedder(config: &TravelConfig) -> Result<Arc<OnnxEmbedder>> {
    info!("Initializing embedding model...");
    Ok(Arc::new(OnnxEmbedder::from_config(&config.embedding)?))
}

async fn build_chatbot(config: &TravelConfig) -> Result<Chatbot> {
    let store = connect(config).await?;
    let embedder = load_embedder(config)?;
    let retriever =
        DualModeRetriever::new(store, embedder, RetrieverConfig::from_config(config)?)?;
    Ok(TravelChatbot::new(retriever))
}

async fn chat(chatbot: &Chatbot) -> Result<()> {
    println!("\n=== Travel Information Chatbot ===");
    println!("Ask questions about landmarks, cities, or countries.");
    println!("Type 'exit' to quit.");
    println!("================================");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nYour question: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };

        match ChatInput::parse(&line) {
            ChatInput::Exit => {
                println!("Goodbye!");
                return Ok(());
            }
            ChatInput::Skip => continue,
            ChatInput::Question(question) => {
                println!("\n{}", chatbot.answer_question(question).await);
            }
        }
    }
}

async fn prepare(config: &TravelConfig, regenerate: bool) -> Result<()> {
    let store = connect(config).await?;
    let embedder = load_embedder(config)?;
    let loader = LandmarkLoader::from_config(store, embedder, config)?;

    match loader.prepare(regenerate).await? {
        Some(report) => {
            println!(
                "Successfully added embeddings for {} landmarks ({} failed)",
                report.embedded, report.failed
            );
        }
        None => {
            println!("Embeddings already exist; skipping (use --regenerate to rebuild)");
        }
    }
    Ok(())
}

async fn status(config: &TravelConfig) -> Result<()> {
    let store = connect(config).await?;
    println!("Query service:  {}", store.query_url());
    println!("Search service: {}", store.search_url());

    let vectors = config.retrieval.vectors_keyspace(&config.capella.bucket)?;
    let rows = store
        .execute_query(&vectors.count_statement(), &QueryParams::new())
        .await;

    match rows {
        Ok(rows) => {
            let count = rows
                .first()
                .and_then(|row| row.get("count"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            println!("Vector records in {}: {}", vectors, count);
        }
        Err(e) => println!("Vector records in {}: unavailable ({})", vectors, e),
    }
    Ok(())
}
