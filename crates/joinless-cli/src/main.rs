//! Joinless CLI
//!
//! - `build`: ingest a CSV of spatial instances, build the neighbor graph and
//!   star neighborhoods at a distance threshold, and cache the snapshot
//! - `inspect`: summarize a cached snapshot
//! - `star`: print one instance's star neighborhood

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use joinless_core::snapshot::read_header;
use joinless_core::{InstanceKey, ScanStrategy, SpatialDataset};
use joinless_storage::{load_dataset, load_or_build, CacheConfig};
use std::fs;
use std::path::{Path, PathBuf};

mod logging;

#[derive(Parser)]
#[command(name = "joinless")]
#[command(author, version, about = "Joinless: spatial neighbor graphs for co-location mining")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or reuse) a dataset snapshot from an instance CSV.
    Build(BuildArgs),

    /// Summarize a snapshot file.
    Inspect {
        /// Snapshot file
        #[arg(long)]
        cache: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the star neighborhood of one instance.
    Star {
        /// Snapshot file
        #[arg(long)]
        cache: PathBuf,
        /// Feature type of the center instance
        #[arg(long)]
        feature: String,
        /// Instance id within the feature type
        #[arg(long)]
        instance: u64,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Instance CSV (Feature,Instance,LocX,LocY,Checkin)
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Snapshot file to reuse or write
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Neighbor distance threshold (> 0)
    #[arg(long)]
    threshold: Option<f64>,
    /// Rebuild even if the snapshot matches
    #[arg(long)]
    force_rebuild: bool,
    /// Pair scan: brute-force or grid
    #[arg(long)]
    strategy: Option<ScanStrategy>,
    /// Scan on the current thread only
    #[arg(long)]
    sequential: bool,
    /// JSON config file; flags given on the command line take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

impl BuildArgs {
    fn into_config(self) -> Result<CacheConfig> {
        let mut config = match &self.config {
            Some(path) => CacheConfig::from_json_file(path)?,
            None => {
                if self.csv.is_none() || self.cache.is_none() || self.threshold.is_none() {
                    return Err(anyhow!(
                        "--csv, --cache and --threshold are required without --config"
                    ));
                }
                CacheConfig::default()
            }
        };
        if let Some(csv) = self.csv {
            config.csv_path = csv;
        }
        if let Some(cache) = self.cache {
            config.cache_path = cache;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(strategy) = self.strategy {
            config.build.strategy = strategy;
        }
        config.force_rebuild |= self.force_rebuild;
        if self.sequential {
            config.build.parallel = false;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => cmd_build(args.into_config()?),
        Commands::Inspect { cache, json } => cmd_inspect(&cache, json),
        Commands::Star {
            cache,
            feature,
            instance,
        } => cmd_star(&cache, &InstanceKey::new(feature, instance)),
    }
}

fn cmd_build(config: CacheConfig) -> Result<()> {
    println!(
        "{} {} at threshold {}",
        "Building".green().bold(),
        config.csv_path.display(),
        config.threshold
    );

    let outcome = load_or_build(&config)?;
    let status = if outcome.status.is_hit() {
        outcome.status.to_string().green()
    } else {
        outcome.status.to_string().yellow()
    };
    println!("  {} {}", "→".cyan(), status);
    println!("  {} {}", "→".cyan(), config.cache_path.display());
    print_summary(&outcome.dataset);
    Ok(())
}

fn cmd_inspect(cache: &Path, json: bool) -> Result<()> {
    let bytes = fs::read(cache).with_context(|| format!("failed to read {}", cache.display()))?;
    let header = read_header(&bytes).with_context(|| format!("invalid snapshot {}", cache.display()))?;
    let dataset = SpatialDataset::from_bytes(&bytes)
        .with_context(|| format!("invalid snapshot {}", cache.display()))?;
    let registry = dataset.registry();

    if json {
        let features: serde_json::Map<String, serde_json::Value> = registry
            .feature_groups()
            .iter()
            .map(|g| (g.name().to_string(), g.len().into()))
            .collect();
        let report = serde_json::json!({
            "format_version": header.format_version,
            "threshold": dataset.distance_threshold(),
            "instances": registry.len(),
            "relations": dataset.graph().len(),
            "stars": dataset.stars().len(),
            "features": features,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} {}", "Snapshot".green().bold(), cache.display());
    println!("  format_version: {}", header.format_version);
    println!("  payload_bytes: {}", header.payload_len);
    print_summary(&dataset);
    Ok(())
}

fn cmd_star(cache: &Path, key: &InstanceKey) -> Result<()> {
    let dataset = load_dataset(cache)?;
    let star = dataset
        .star(key)
        .ok_or_else(|| anyhow!("no instance {key} in {}", cache.display()))?;
    let center = star.center();

    println!(
        "{} {} at ({}, {}), checkin {}",
        "Star".green().bold(),
        key.to_string().bold(),
        center.x,
        center.y,
        center.checkin
    );
    if star.is_empty() {
        println!(
            "  (no neighbors within {})",
            dataset.distance_threshold()
        );
        return Ok(());
    }
    for neighbor in star.neighbors() {
        println!(
            "  {} {} (distance {:.3})",
            "→".cyan(),
            neighbor.key(),
            center.distance_to(neighbor)
        );
    }
    let types: Vec<&str> = star.feature_types().into_iter().collect();
    println!("  {} feature types: {}", "→".yellow(), types.join(", "));
    Ok(())
}

fn print_summary(dataset: &SpatialDataset) {
    let registry = dataset.registry();
    println!("  threshold: {}", dataset.distance_threshold());
    println!("  instances: {}", registry.len());
    println!("  relations: {}", dataset.graph().len());
    println!("  stars: {}", dataset.stars().len());
    for group in registry.feature_groups() {
        println!("    {}: {}", group.name(), group.len());
    }
}
