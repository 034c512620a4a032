use crate::core::memory::Estimator;
use crate::ingest::synthetic::{SyntheticConfig, generate};
use crate::study::clean::{CleanConfig, clean};
use crate::study::measure::{MeasureConfig, measure};
use crate::study::report::{DEFAULT_MAX_DISK_SIZE, report};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod core;
pub mod ingest;
pub mod study;

#[derive(Parser)]
#[command(name = "isafoot")]
#[command(about = "Disk size vs in-memory footprint of ISA-Tab metadata", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy study directories that load as ISA-Tab
    Clean {
        input: PathBuf,
        output: PathBuf,

        /// Maximum number of study folders (<= 0 for all)
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        max_files: i64,
    },

    /// Measure disk and in-memory sizes of every study and assay table
    Measure {
        input: PathBuf,
        output: PathBuf,

        /// Maximum number of study folders (<= 0 for all)
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        max_files: i64,
    },

    /// Split measurements into one row per in-memory representation
    Categorize { input: PathBuf, output: PathBuf },

    /// Fit memory size against disk size per category
    Report {
        input: PathBuf,

        /// Ignore tables at least this large on disk (bytes)
        #[arg(long, default_value_t = DEFAULT_MAX_DISK_SIZE)]
        max_disk_size: u64,
    },

    /// Estimate the footprint of a random object graph
    Synthetic {
        #[arg(long, default_value_t = 1_000_000)]
        nodes: u32,

        #[arg(long, default_value_t = 8)]
        fanout: u32,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Clean {
            input,
            output,
            max_files,
        } => {
            clean(&input, &output, &CleanConfig { max_files })?;
        }
        Commands::Measure {
            input,
            output,
            max_files,
        } => {
            measure(&input, &output, &MeasureConfig { max_files })?;
        }
        Commands::Categorize { input, output } => {
            let reader = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
            let writer =
                File::create(&output).with_context(|| format!("creating {}", output.display()))?;
            let rows = study::categorize::categorize(reader, writer)?;
            info!(rows, "wrote {}", output.display());
        }
        Commands::Report {
            input,
            max_disk_size,
        } => {
            let reader = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
            for (category, fit) in report(reader, max_disk_size)? {
                match fit {
                    Some(fit) => println!(
                        "{category}: memory_kb = {:.4} * disk_kb + {:.4} (n = {})",
                        fit.slope, fit.intercept, fit.samples
                    ),
                    None => println!("{category}: not enough data"),
                }
            }
        }
        Commands::Synthetic {
            nodes,
            fanout,
            seed,
        } => {
            let cfg = SyntheticConfig {
                node_count: nodes,
                fanout,
                seed,
            };
            let (heap, root) = generate(&cfg);
            let stats = Estimator::new().estimate_stats(&heap, root)?;

            println!(
                "nodes: {}, reachable: {}, depth: {}, approx memory: {} MB",
                heap.node_count(),
                stats.nodes,
                stats.max_depth,
                stats.bytes / (1024 * 1024)
            );
        }
    }

    Ok(())
}
