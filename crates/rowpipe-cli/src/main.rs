//! rowpipe CLI: run, validate and explain YAML pipelines.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rowpipe_core::prelude::PipelineConfig;
use rowpipe_exec::descriptors;
use rowpipe_planner::{load_yaml_pipeline, ParsedPipeline};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "rowpipe", version = rowpipe_core::VERSION)]
#[command(about = "Record-stream pipelines: filter, distinct, join, aggregate, transform", long_about = None)]
struct Cli {
    /// Log pipeline binding and materialization (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a pipeline from a YAML file
    Run {
        /// Path to the pipeline YAML file (looked up in the search paths if relative and absent)
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Distinct-value cap for audit nodes (overrides config)
        #[arg(long)]
        distinct_threshold: Option<usize>,
    },

    /// Validate a pipeline YAML file: graph shape and field negotiation
    Validate {
        #[arg(short, long)]
        pipeline: PathBuf,
    },

    /// Show node order, buffering and fields of a pipeline
    Explain {
        #[arg(short, long)]
        pipeline: PathBuf,
    },

    /// List available node types
    Nodes {
        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            pipeline,
            distinct_threshold,
        } => run_pipeline(&pipeline, distinct_threshold),
        Commands::Validate { pipeline } => match validate_pipeline(&pipeline) {
            Ok(()) => {
                println!("✓ Pipeline is valid");
                Ok(())
            }
            Err(e) => {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Explain { pipeline } => explain_pipeline(&pipeline),
        Commands::Nodes { json } => list_nodes(json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so that JSON lines targets can own stdout.
fn init_logging(verbose: bool) {
    let default = if verbose { "rowpipe=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &Path) -> Result<ParsedPipeline, Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_env();
    tracing::debug!(path = %path.display(), "loading pipeline");
    Ok(load_yaml_pipeline(path, &config)?)
}

fn run_pipeline(
    path: &Path,
    distinct_threshold: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = PipelineConfig::from_env();
    if let Some(threshold) = distinct_threshold {
        config.distinct_threshold = threshold;
    }
    let parsed = load_yaml_pipeline(path, &config)?;
    let summary = parsed.pipeline.run()?;

    eprintln!("✓ Pipeline executed successfully");
    eprintln!("  Duration: {}ms", summary.finished_ms - summary.started_ms);
    eprintln!("  Nodes: {}", summary.nodes);
    for target in &summary.targets {
        let name = parsed.name(target.node).unwrap_or(target.key.as_str());
        eprintln!("  {} ({}): {} rows", name, target.key, target.rows);
    }
    Ok(())
}

fn validate_pipeline(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = load(path)?;
    parsed.pipeline.fields()?;
    Ok(())
}

fn explain_pipeline(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = load(path)?;
    let plan = parsed.pipeline.explain()?;

    println!("Pipeline Execution Plan");
    println!("=======================");
    println!();
    println!(
        "Distinct threshold: {}",
        parsed.pipeline.config().distinct_threshold
    );
    println!();
    for (i, node) in plan.iter().enumerate() {
        let name = parsed.name(node.node).unwrap_or(node.key);
        let inputs: Vec<&str> = node
            .inputs
            .iter()
            .map(|id| parsed.name(*id).unwrap_or("?"))
            .collect();
        println!(
            "  {}. {} [{}] {:?}/{:?}",
            i + 1,
            name,
            node.key,
            node.category,
            node.buffering
        );
        if !inputs.is_empty() {
            println!("     inputs: {}", inputs.join(", "));
        }
        println!("     fields: {}", node.fields.field_names().join(", "));
    }
    Ok(())
}

fn list_nodes(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let nodes = descriptors();
    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }
    for node in nodes {
        println!("{:<20} {:?}  {}", node.key, node.category, node.description);
        for attr in node.attributes {
            println!("    {:<18} {}", attr.name, attr.description);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
