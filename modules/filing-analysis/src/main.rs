use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use filing_analysis::{analyze, render_scatter_svg, KMeans};
use filing_common::Config;
use filing_graph::{GraphClient, GraphReader};

/// Sample stored document vectors, project them to 2-D and cluster them.
#[derive(Parser)]
#[command(name = "filing-analysis")]
struct Cli {
    /// Maximum number of vectors to sample.
    #[arg(long, default_value_t = 1000)]
    limit: usize,
    #[arg(long, default_value_t = 5)]
    clusters: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 300)]
    max_iter: usize,
    #[arg(long, default_value = "analysis.svg")]
    svg: PathBuf,
    /// JSON report with every projected point and the cluster sizes.
    #[arg(long, default_value = "analysis.json")]
    report: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("filing_analysis=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let client = GraphClient::from_config(config.require_graph()?).await?;
    let sample = GraphReader::new(client)
        .sample_embeddings(cli.limit)
        .await
        .context("sampling stored embeddings")?;

    let kmeans = KMeans {
        k: cli.clusters,
        seed: cli.seed,
        max_iter: cli.max_iter,
        ..KMeans::default()
    };
    let analysis = analyze(&sample, &kmeans)?;

    std::fs::write(&cli.svg, render_scatter_svg(&analysis.points))
        .with_context(|| format!("writing {}", cli.svg.display()))?;
    std::fs::write(&cli.report, serde_json::to_string_pretty(&analysis)?)
        .with_context(|| format!("writing {}", cli.report.display()))?;

    info!(
        svg = %cli.svg.display(),
        report = %cli.report.display(),
        sizes = ?analysis.cluster_sizes,
        "Analysis written"
    );
    Ok(())
}
