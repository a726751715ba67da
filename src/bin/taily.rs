//! `taily` CLI: write term statistics files and score shards for a query.

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use taily::config::CollectionManifest;
#[cfg(feature = "cli")]
use taily::{score_shards, store};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(author, version, about = "Taily shard selection CLI", long_about = None)]
struct Args {
    /// Log intermediate estimates (cutoff, normalization) to stderr.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize per-term feature values and write a statistics file.
    Store {
        /// JSON file: an array with one array of feature values per term.
        #[arg(short, long)]
        features: PathBuf,

        /// Statistics file to write (one 24-byte record per term).
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Score the shards of a collection for a query.
    Score {
        /// Collection manifest (full-index and shard statistics files + sizes).
        #[arg(short, long)]
        manifest: PathBuf,

        /// Number of top results the query is shooting for.
        #[arg(short, long, default_value_t = 50)]
        ntop: usize,

        /// Query term indexes.
        #[arg(required = true)]
        terms: Vec<usize>,
    },

    /// Print stored term statistics.
    Inspect {
        /// Statistics file.
        #[arg(short, long)]
        stats: PathBuf,

        /// Term indexes to print (all terms when omitted).
        terms: Vec<usize>,
    },
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "cli")]
    {
        let args = Args::parse();
        init_tracing(args.verbose);

        match args.command {
            Commands::Store { features, output } => {
                let text = std::fs::read_to_string(&features)?;
                let term_features: Vec<Vec<f64>> = serde_json::from_str(&text)?;
                let written = store::write_index_stats(&output, &term_features)?;
                println!("Wrote {} term statistics to {:?}", written.len(), output);
            }
            Commands::Score {
                manifest,
                ntop,
                terms,
            } => {
                let manifest = CollectionManifest::load(&manifest)?;
                let (global, shards) = manifest.query_statistics(&terms)?;
                let scores = score_shards(&global, &shards, ntop)?;

                println!("Scores for terms {:?} (ntop={}):", terms, ntop);
                for (shard, score) in scores.iter().enumerate() {
                    println!("  Shard {}: score {:.4}", shard, score);
                }
            }
            Commands::Inspect { stats, terms } => {
                let terms: Vec<usize> = if terms.is_empty() {
                    (0..store::term_count(&stats)?).collect()
                } else {
                    terms
                };
                let records = store::read_query_stats(&stats, &terms)?;
                for (term, s) in terms.iter().zip(&records) {
                    println!(
                        "  Term {}: expected_value {:.4} variance {:.4} frequency {}",
                        term, s.expected_value, s.variance, s.frequency
                    );
                }
            }
        }
    }

    #[cfg(not(feature = "cli"))]
    println!("CLI feature is disabled. Build with --features cli to enable.");

    Ok(())
}
