use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::fs;
use std::path::PathBuf;

use wallpaper_finder_core::config::LogLevel;
use wallpaper_finder_core::listing::{SortMode, TimeWindow};
use wallpaper_finder_core::logging::{init_logger, LOG_ENV_VAR};
use wallpaper_finder_core::picker::{KeepAll, Picker};
use wallpaper_finder_core::{Config, WallpaperFinder};

mod progress;
mod prompt;

use progress::DownloadBar;
use prompt::PromptPicker;

#[derive(Parser)]
#[command(name = "wallpaper-finder")]
#[command(about = "Download, review and archive wallpapers without duplicates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List collections, download their images and archive the ones you keep
    Run {
        /// Collections to list (overrides the configuration)
        collections: Vec<String>,

        /// Listing sort mode: hot, new, top or rising
        #[arg(long)]
        sort: Option<SortMode>,

        /// Posts per collection
        #[arg(long)]
        limit: Option<u32>,

        /// Time window of a top listing: hour, day, week, month, year or all
        #[arg(long)]
        time_window: Option<TimeWindow>,

        /// Comma separated extensions to download, without dots
        #[arg(long, value_delimiter = ',')]
        extensions: Option<Vec<String>>,

        /// Where downloads are staged
        #[arg(long)]
        temp_dir: Option<PathBuf>,

        /// Where kept images are archived
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Number of download workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Archive picked images even if they are already in the archive
        #[arg(long)]
        no_dedup: bool,

        /// Keep every download without asking
        #[arg(long)]
        keep_all: bool,

        /// Write logs to rotating files in this directory instead of stderr
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Write the run report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Verbosity level
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "wallpaper-finder.json")]
        path: PathBuf,
    },
}

fn init_logging(log_dir: Option<&PathBuf>, level: LevelFilter) -> anyhow::Result<()> {
    match log_dir {
        Some(dir) => init_logger(dir, level).map_err(|e| anyhow!("Failed to start logging: {}", e)),
        None => {
            env_logger::Builder::from_env(
                env_logger::Env::new().filter_or(LOG_ENV_VAR, level.to_string()),
            )
            .init();
            Ok(())
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            collections,
            sort,
            limit,
            time_window,
            extensions,
            temp_dir,
            archive_dir,
            workers,
            no_dedup,
            keep_all,
            log_dir,
            report,
            verbose,
            config,
        } => {
            // Set up configuration
            let mut config = if let Some(config_path) = config {
                Config::from_file(&config_path)
                    .with_context(|| format!("Loading {}", config_path.display()))?
            } else {
                Config::default()
            };

            // Override config with command line arguments
            if !collections.is_empty() {
                config.listing.collections = collections;
            }
            if let Some(sort) = sort {
                config.listing.sort = sort;
            }
            if let Some(limit) = limit {
                config.listing.limit = limit;
            }
            if let Some(time_window) = time_window {
                config.listing.time_window = time_window;
            }
            if let Some(extensions) = extensions {
                config.allowed_extensions = extensions;
            }
            if let Some(temp_dir) = temp_dir {
                config.temp_dir = temp_dir;
            }
            if let Some(archive_dir) = archive_dir {
                config.archive_dir = archive_dir;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if no_dedup {
                config.remove_duplicates = false;
            }

            // Set log level based on verbosity
            match verbose {
                0 => {}
                1 => config.log_level = LogLevel::Debug,
                _ => config.log_level = LogLevel::Trace,
            }

            // Validate configuration
            config.validate()?;
            init_logging(log_dir.as_ref(), config.log_level.into())?;

            let finder = WallpaperFinder::new(config)?;

            let cancel = finder.cancel_token();
            ctrlc::set_handler(move || {
                warn!("Interrupted, stopping after in-flight downloads");
                cancel.cancel();
            })?;

            info!(
                "Starting wallpaper run into {}...",
                finder.config().archive_dir.display()
            );
            let mut bar = DownloadBar::start(finder.progress())?;
            let mut inner: Box<dyn Picker> = if keep_all {
                Box::new(KeepAll)
            } else {
                Box::new(PromptPicker::stdio())
            };

            // The bar must be gone before the picker talks to the terminal
            let mut picker = |staged: &[PathBuf]| {
                bar.finish();
                inner.pick(staged)
            };
            let result = finder.run(&mut picker);
            bar.finish();
            let run_report = result?;
            info!("Run complete");

            println!("{}", run_report);
            for failed in &run_report.failed {
                println!("  failed: {} ({})", failed.source_url, failed.reason);
            }
            for leftover in &run_report.leftover {
                println!("  already archived under this name: {}", leftover.display());
            }

            println!("Archive: {}", finder.config().archive_dir.display());

            if let Some(path) = report {
                fs::write(&path, serde_json::to_string_pretty(&run_report)?)
                    .with_context(|| format!("Writing report to {}", path.display()))?;
                println!("Report written to: {}", path.display());
            }

            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}
