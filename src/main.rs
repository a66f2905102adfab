//! `topic-hierarchy` command line.
//!
//! Each subcommand runs one pipeline stage from the `[section]` of the same
//! name in the TOML config; flags override single entries.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use topic_hierarchy::cluster::Linkage;
use topic_hierarchy::config::PipelineConfig;
use topic_hierarchy::document::WhitespaceLemmatiser;
use topic_hierarchy::pipeline::{cleaning, clustering, compare, distribution, hierarchical, mapping};

/// Topic similarity, clustering and hierarchy over topic-model output
#[derive(Parser)]
#[command(name = "topic-hierarchy")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Pipeline config (TOML); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lemmatise a raw corpus
    Clean {
        /// Raw document file
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Cleaned document file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Assign sub-topics to main topics and merge document distributions
    Assign {
        /// Main topics claimed by each sub-topic
        #[arg(long)]
        max_assign: Option<usize>,
    },
    /// Compute topic totals and field distributions
    Distribute {
        /// Documents with topic distributions
        #[arg(long)]
        documents: Option<PathBuf>,
    },
    /// Compare distribution totals with a previous run
    Compare {
        /// Total ids to compare (repeatable)
        #[arg(long = "distribution")]
        distributions: Vec<String>,
    },
    /// Cluster main topics and sub-topic groups
    Cluster {
        /// Linkage between clusters: min, max or avg
        #[arg(long)]
        linkage: Option<Linkage>,
        /// Number of clusters cut from the main dendrogram
        #[arg(long)]
        clusters: Option<usize>,
    },
    /// Build hierarchy maps from clustered topics
    Map {
        /// Total id sizing the bubbles
        #[arg(long)]
        bubble_size: Option<String>,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut config = load_config(cli.config.as_ref())?;

    let time = match cli.command {
        Commands::Clean { corpus, output } => {
            let cfg = &mut config.cleaning;
            if let Some(corpus) = corpus {
                cfg.corpus = corpus;
            }
            if let Some(output) = output {
                cfg.output = output;
            }
            let (summary, time) = cleaning::run(cfg, &WhitespaceLemmatiser).context("cleaning failed")?;
            println!(
                "{} documents, {} removed, {} rare lemmas dropped",
                summary.total,
                summary.removed(),
                summary.low_count_lemmas
            );
            time
        }
        Commands::Assign { max_assign } => {
            let cfg = &mut config.hierarchical;
            if let Some(n) = max_assign {
                cfg.max_assign = n;
            }
            let report = hierarchical::run(cfg).context("hierarchical modelling failed")?;
            println!(
                "{} sub-topics assigned, {} documents merged",
                report.assignments.len(),
                report.merged_documents
            );
            report.time
        }
        Commands::Distribute { documents } => {
            let cfg = &mut config.distribution;
            if let Some(documents) = documents {
                cfg.documents = documents;
            }
            distribution::run(cfg).context("topic distribution failed")?
        }
        Commands::Compare { distributions } => {
            let cfg = &mut config.comparison;
            if !distributions.is_empty() {
                cfg.distributions = distributions;
            }
            let (result, time) = compare::run(cfg).context("comparison failed")?;
            println!(
                "{} main topics compared, {} sub-topics",
                result.main.len(),
                result.sub.as_ref().map_or(0, |s| s.len())
            );
            time
        }
        Commands::Cluster { linkage, clusters } => {
            let cfg = &mut config.clustering;
            if let Some(linkage) = linkage {
                cfg.linkage = linkage;
            }
            if let Some(n) = clusters {
                cfg.clusters = n;
            }
            clustering::run(cfg).context("clustering failed")?
        }
        Commands::Map { bubble_size } => {
            let cfg = &mut config.mapping;
            if let Some(total) = bubble_size {
                cfg.bubble_size = total;
            }
            mapping::run(cfg).context("mapping failed")?
        }
    };
    println!("{time}");
    Ok(())
}
