use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ai_client::OpenAi;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use filing_common::{Config, DocumentIdStrategy, DocumentSink, FilingDocument};
use filing_graph::migrate::{migrate, missing_schema};
use filing_graph::{DocumentWriter, GraphClient};
use filing_ingest::{
    fetch_archive, load_filings, read_staging, BatchEmbedder, ChunkConfig, CsvStaging,
    FailurePolicy, IngestPipeline, RateLimiter, RetryPolicy, TextChunker,
};

#[derive(Parser)]
#[command(name = "filing-ingest", about = "Chunk, embed and load 10-K business descriptions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and upsert filings straight into the graph.
    Run {
        #[command(flatten)]
        ingest: IngestArgs,
        /// Create Company nodes from the filings before loading documents.
        #[arg(long)]
        seed_companies: bool,
        /// Run schema migrations first.
        #[arg(long)]
        migrate: bool,
        /// Documents per upsert round trip.
        #[arg(long)]
        write_batch_size: Option<usize>,
    },
    /// Chunk and embed filings into a CSV staging file.
    Stage {
        #[command(flatten)]
        ingest: IngestArgs,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Upsert a CSV staging file into the graph.
    Load {
        #[arg(long, short)]
        input: PathBuf,
        #[arg(long)]
        migrate: bool,
        #[arg(long)]
        write_batch_size: Option<usize>,
    },
    /// Create the indexes the bulk load depends on.
    Migrate {
        /// Also create a vector index of this width.
        #[arg(long)]
        dimensions: Option<usize>,
    },
}

#[derive(Args)]
struct IngestArgs {
    /// Local zip path or http(s) URL. Defaults to FILINGS_ARCHIVE_URL.
    #[arg(long)]
    archive: Option<String>,
    /// Where downloaded archives are cached.
    #[arg(long, default_value = "data")]
    cache_dir: PathBuf,
    /// Only process the first N filings.
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long)]
    chunk_size: Option<usize>,
    #[arg(long)]
    chunk_overlap: Option<usize>,
    #[arg(long)]
    embed_batch_size: Option<usize>,
    /// Minimum milliseconds between embedding calls.
    #[arg(long)]
    embed_interval_ms: Option<u64>,
    #[arg(long)]
    max_retries: Option<u32>,
    #[arg(long, default_value_t = DocumentIdStrategy::CompanyName)]
    id_strategy: DocumentIdStrategy,
    /// Continue past filings that fail instead of aborting the run.
    #[arg(long)]
    skip_failed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("filing_ingest=info".parse()?)
                .add_directive("filing_graph=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Run {
            ingest,
            seed_companies,
            migrate: run_migrations,
            write_batch_size,
        } => {
            let client = GraphClient::from_config(config.require_graph()?).await?;
            prepare_schema(&client, run_migrations).await?;

            let filings = read_filings(&ingest, &config).await?;
            let writer = Arc::new(DocumentWriter::new(
                client,
                write_batch_size.unwrap_or(config.write_batch_size),
            ));
            if seed_companies {
                writer.upsert_companies(&filings).await?;
            }

            let pipeline = build_pipeline(&ingest, &config, writer)?;
            let report = pipeline.run(&filings).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Stage { ingest, output } => {
            let filings = read_filings(&ingest, &config).await?;
            let staging = Arc::new(CsvStaging::create(&output)?);

            let pipeline = build_pipeline(&ingest, &config, staging)?;
            let report = pipeline.run(&filings).await?;
            info!(path = %output.display(), "Staging file written");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Load {
            input,
            migrate: run_migrations,
            write_batch_size,
        } => {
            let client = GraphClient::from_config(config.require_graph()?).await?;
            prepare_schema(&client, run_migrations).await?;

            let records = tokio::task::spawn_blocking(move || read_staging(&input)).await??;
            let writer = DocumentWriter::new(
                client,
                write_batch_size.unwrap_or(config.write_batch_size),
            );
            let stats = writer.upsert(&records).await?;
            info!(batches = stats.batches, written = stats.written, "Staging file loaded");
        }
        Command::Migrate { dimensions } => {
            let client = GraphClient::from_config(config.require_graph()?).await?;
            migrate(&client, dimensions).await?;
        }
    }

    Ok(())
}

/// The writer's MATCH/MERGE rely on two indexes; refuse to bulk load without them.
async fn prepare_schema(client: &GraphClient, run_migrations: bool) -> Result<()> {
    if run_migrations {
        migrate(client, None).await?;
    }
    let missing = missing_schema(client).await?;
    if !missing.is_empty() {
        bail!(
            "graph is missing required indexes {missing:?}; rerun with --migrate or run `filing-ingest migrate`"
        );
    }
    Ok(())
}

async fn read_filings(args: &IngestArgs, config: &Config) -> Result<Vec<FilingDocument>> {
    let source = args
        .archive
        .clone()
        .or_else(|| config.archive_url.clone())
        .context("no archive given: pass --archive or set FILINGS_ARCHIVE_URL")?;

    let path = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_archive(&source, &args.cache_dir).await?
    } else {
        Path::new(&source).to_path_buf()
    };

    let contents = load_filings(path).await?;
    if !contents.skipped.is_empty() {
        warn!(skipped = contents.skipped.len(), "Some archive entries were not usable");
    }

    let mut filings = contents.filings;
    if let Some(limit) = args.limit {
        filings.truncate(limit);
    }
    Ok(filings)
}

fn build_pipeline(
    args: &IngestArgs,
    config: &Config,
    sink: Arc<dyn DocumentSink>,
) -> Result<IngestPipeline> {
    let chunker = TextChunker::new(ChunkConfig {
        max_len: args.chunk_size.unwrap_or(config.chunk_size),
        overlap: args.chunk_overlap.unwrap_or(config.chunk_overlap),
    })?;

    let models = config.require_models()?;
    let mut agent = OpenAi::new(&models.openai_api_key, &models.chat_model)
        .with_embedding_model(&models.embedding_model);
    if let Some(url) = &models.openai_base_url {
        agent = agent.with_base_url(url);
    }

    let interval = args.embed_interval_ms.unwrap_or(config.embed_interval_ms);
    let embedder = BatchEmbedder::builder()
        .agent(Arc::new(agent))
        .batch_size(args.embed_batch_size.unwrap_or(config.embed_batch_size))
        .limiter(RateLimiter::fixed_interval(Duration::from_millis(interval)))
        .retry(RetryPolicy::with_retries(
            args.max_retries.unwrap_or(config.embed_max_retries),
        ))
        .id_strategy(args.id_strategy)
        .build();

    let policy = if args.skip_failed {
        FailurePolicy::SkipFiling
    } else {
        FailurePolicy::Abort
    };

    Ok(IngestPipeline::new(chunker, embedder, sink).with_failure_policy(policy))
}
