use anyhow::{bail, Context, Result};
use clap::Parser;
use statlysis::cli::{AnalyzeArgs, Cli, Command};
use statlysis::loader::load_all_aggregated_files;
use statlysis::pipeline::run_analysis;
use statlysis::Dataset;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber (RUST_LOG wins over --verbose)
fn init_tracing(verbose: bool) {
    let default = if verbose { "statlysis=debug" } else { "statlysis=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load(folder: &Path) -> Result<Dataset> {
    let report = load_all_aggregated_files(folder)
        .with_context(|| format!("Failed to load data from {}", folder.display()))?;
    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.path.display(), failure.reason);
    }
    if report.dataset.is_empty() {
        bail!("No data loaded from {}", folder.display());
    }
    Ok(report.dataset)
}

fn inspect(folder: &Path) -> Result<()> {
    let dataset = load(folder)?;
    println!("Rows: {}", dataset.num_rows());
    println!("Response candidates: {}", dataset.numeric_columns().join(", "));
    for column in ["CellLine", "NP", "Dose"] {
        if dataset.has_column(column) {
            println!("{column}: {}", dataset.distinct_values(column)?.join(", "));
        }
    }
    Ok(())
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let config = args.analysis_config()?;
    let dataset = load(&args.folder)?;
    let report = run_analysis(&dataset, &config, &args.output);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in report.log.entries() {
            println!("{entry}");
        }
        if let Some(conclusion) = &report.conclusion {
            println!();
            println!("{conclusion}");
        }
    }

    if report.aborted {
        bail!("Analysis aborted");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Inspect { folder } => inspect(folder),
        Command::Analyze(args) => analyze(args),
    }
}
