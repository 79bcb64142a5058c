//! SeedGrow CLI
//!
//! Runs detection for a range of query seeds of one dataset and appends each
//! prediction to the dataset's result files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seedgrow::utils::{load_json, save_json, DatasetFiles, ResultWriter};
use seedgrow::{ClusteringBackend, Detector, DetectorConfig};

#[derive(Parser)]
#[command(name = "seedgrow")]
#[command(about = "Grow communities around query seeds with a learned expansion policy")]
struct Cli {
    /// JSON config; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset name
    #[arg(short, long)]
    dataset: Option<String>,

    /// Dataset root directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// Result directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Number of trailing communities used for training
    #[arg(long)]
    train_size: Option<usize>,

    /// Ego depth of the working graph
    #[arg(long)]
    ego_depth: Option<usize>,

    /// Policy hidden width
    #[arg(long)]
    hidden_size: Option<usize>,

    /// Learning rate
    #[arg(long)]
    lr: Option<f32>,

    /// Episodes per update
    #[arg(long)]
    batch_size: Option<usize>,

    /// Training epochs per outer iteration
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Outer iterations
    #[arg(long)]
    outer_iterations: Option<usize>,

    /// Curriculum cluster count
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Curriculum clustering backend (spectral, k_medoids, gaussian_mixture, hierarchical)
    #[arg(long)]
    backend: Option<ClusteringBackend>,

    /// Keep the first-pass prediction and skip curriculum re-selection
    #[arg(long)]
    ablation: bool,

    /// Drop known communities whose induced subgraph is disconnected
    #[arg(long)]
    drop_disconnected: bool,

    /// First query to process
    #[arg(long, default_value = "0")]
    start: usize,

    /// Number of queries to process
    #[arg(long, default_value = "1")]
    search_size: usize,

    /// Write the effective config here and exit
    #[arg(long)]
    save_config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<(DetectorConfig, usize, usize, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => load_json::<DetectorConfig, _>(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => DetectorConfig::default(),
        };

        if let Some(v) = self.dataset { config.dataset = v; }
        if let Some(v) = self.root { config.root = v; }
        if let Some(v) = self.output { config.output = v; }
        if let Some(v) = self.seed { config.seed = v; }
        if let Some(v) = self.train_size { config.train_size = v; }
        if let Some(v) = self.ego_depth { config.ego_depth = v; }
        if let Some(v) = self.hidden_size { config.expander.hidden_size = v; }
        if let Some(v) = self.lr { config.expander.learning_rate = v; }
        if let Some(v) = self.batch_size { config.batch_size = v; }
        if let Some(v) = self.epochs { config.epochs = v; }
        if let Some(v) = self.outer_iterations { config.outer_iterations = v; }
        if let Some(v) = self.clusters { config.curriculum.n_clusters = v; }
        if let Some(v) = self.backend { config.curriculum.backend = v; }
        config.ablation |= self.ablation;
        config.drop_disconnected |= self.drop_disconnected;

        config.validate().context("invalid configuration")?;
        Ok((config, self.start, self.search_size, self.save_config))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (config, start, search_size, save_config) = Cli::parse().into_config()?;
    if let Some(path) = save_config {
        save_json(&config, &path).with_context(|| format!("writing config {}", path.display()))?;
        info!(path = %path.display(), "config saved");
        return Ok(());
    }

    let files = DatasetFiles::new(&config.root, &config.dataset);
    let (graph, communities) = files
        .load()
        .with_context(|| format!("loading dataset {}", config.dataset))?;
    let graph = Arc::new(graph);
    let queries = files.queries(&config.dataset).context("loading query seeds")?;
    let writer = ResultWriter::new(&config.output, &config.dataset);
    info!(
        dataset = %config.dataset,
        nodes = graph.n_nodes(),
        edges = graph.n_edges(),
        communities = communities.len(),
        queries = queries.len(),
        "dataset loaded"
    );

    let mut failures = 0;
    for (i, &(seed, com_index)) in queries.iter().enumerate().skip(start).take(search_size) {
        info!(query = i, seed, com_index, "processing query");
        let outcome = Detector::new(Arc::clone(&graph), &communities, seed, com_index, config.clone())
            .and_then(|mut detector| detector.detect())
            .with_context(|| format!("query {} (seed {})", i, seed));

        match outcome {
            Ok(detection) => {
                writer
                    .write(detection.seed, detection.com_index, &detection.community)
                    .context("writing results")?;
                info!(query = i, size = detection.community.len(), "prediction written");
            }
            Err(e) => {
                failures += 1;
                error!("{:#}", e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of the selected queries failed", failures);
    }
    Ok(())
}
