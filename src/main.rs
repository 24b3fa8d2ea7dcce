use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use cutflow::config::Config;
use cutflow::pipeline;

#[derive(Parser, Debug)]
#[command(author, version, about = "Apply event selection cuts and compute cut efficiencies")]
struct Cli {
    /// Analysis configuration (TOML)
    #[arg(long, short)]
    config: PathBuf,

    /// Worker threads for chunk loading (overrides the config)
    #[arg(long)]
    threads: Option<usize>,

    /// Skip writing the filtered Parquet snapshot
    #[arg(long)]
    no_export: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if cli.threads.is_some() {
        config.threads = cli.threads;
    }

    let summary = pipeline::run(&config, !cli.no_export)?;

    log::info!("Report: {}", summary.report_path.display());
    if let Some(path) = &summary.snapshot_path {
        log::info!("Snapshot: {}", path.display());
    }
    log::info!(
        "{} cut group(s) exported to {}",
        summary.efficiencies.len(),
        config.output.efficiency_dir.display()
    );
    Ok(())
}
