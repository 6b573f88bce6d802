use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ai_client::OpenAi;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use filing_chat::{read_pairs, router, write_jsonl, AppState, ChatSession, FineTuneExample, GraphQa};
use filing_common::Config;
use filing_graph::{GraphClient, GraphReader};

#[derive(Parser)]
#[command(name = "filing-chat", about = "Chat over the 10-K filings graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the chat API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Skip graph question answering even when NEO4J_URI is set.
        #[arg(long)]
        no_graph: bool,
    },
    /// Turn question/answer pairs (JSONL) into a chat fine-tuning file.
    ExportFinetune {
        #[arg(long, short)]
        input: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        /// System message prepended to every example.
        #[arg(long)]
        system: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("filing_chat=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    match Cli::parse().command {
        Command::Serve {
            host,
            port,
            no_graph,
        } => serve(host, port, no_graph).await,
        Command::ExportFinetune {
            input,
            output,
            system,
        } => export_finetune(&input, &output, system.as_deref()),
    }
}

async fn serve(host: Option<String>, port: Option<u16>, no_graph: bool) -> Result<()> {
    let config = Config::from_env()?;

    let models = config.require_models()?;
    let mut agent = OpenAi::new(&models.openai_api_key, &models.chat_model);
    if let Some(url) = &models.openai_base_url {
        agent = agent.with_base_url(url);
    }
    let agent = Arc::new(agent);

    let qa = match (&config.graph, no_graph) {
        (Some(graph), false) => {
            let client = GraphClient::from_config(graph).await?;
            Some(GraphQa::new(agent.clone(), Arc::new(GraphReader::new(client))))
        }
        _ => {
            warn!("No graph configured; /ask is disabled");
            None
        }
    };

    let session = ChatSession::new(agent);
    info!(session = %session.id(), model = %models.chat_model, "Chat session started");
    let app = router(Arc::new(AppState::new(session, qa)));

    let addr = format!(
        "{}:{}",
        host.unwrap_or(config.chat_host),
        port.unwrap_or(config.chat_port)
    );
    info!("Filing chat API starting on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn export_finetune(input: &Path, output: &Path, system: Option<&str>) -> Result<()> {
    let reader = BufReader::new(
        File::open(input).with_context(|| format!("opening {}", input.display()))?,
    );
    let examples: Vec<_> = read_pairs(reader)?
        .iter()
        .map(|p| FineTuneExample::from_pair(system, &p.question, &p.answer))
        .collect();

    let writer = BufWriter::new(
        File::create(output).with_context(|| format!("creating {}", output.display()))?,
    );
    let written = write_jsonl(writer, &examples)?;
    info!(examples = written, path = %output.display(), "Fine-tuning file written");
    Ok(())
}
