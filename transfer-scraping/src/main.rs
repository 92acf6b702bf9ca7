use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use clap::Parser;
use log::warn;
use transfer_scraping::{
    config::Config,
    pipeline::{self, PipelineOptions},
};
use transfer_scraping_utils::fs_util::read_toml;

#[derive(Parser)]
struct Opts {
    /// TOML file describing leagues, seasons, clubs and fetch settings.
    config_path: PathBuf,
    /// Overrides the output directory from the config file.
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Write dataset files even for seasons with permanently failed pages.
    #[arg(long)]
    force_partial: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opts = Opts::parse();
    let config: Config = read_toml(&opts.config_path)?;
    let options = PipelineOptions {
        out_dir: opts.out_dir.unwrap_or_else(|| config.out_dir.clone()),
        force_partial: opts.force_partial,
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = Arc::clone(&cancelled);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; letting in-flight fetches finish");
                cancelled.store(true, Ordering::Relaxed);
            }
        });
    }

    let report = pipeline::run(&config, &options, &cancelled).await?;
    report.log_summary();
    Ok(())
}
