use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use tei_lexicon::locate::find_source;
use tei_lexicon::pipeline::{convert, print_summary, write_summary};
use tei_lexicon::{Config, Source};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tei-lexicon")]
#[command(about = "Convert the Ruland and Sommerhoff TEI dictionaries into indexed JSON")]
struct Args {
    /// Ruland document (.xml or .xml.bz2); located automatically if omitted
    #[arg(long)]
    ruland: Option<PathBuf>,

    /// Sommerhoff document (.xml or .xml.bz2); located automatically if omitted
    #[arg(long)]
    sommerhoff: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extraction threads per collection (0 = auto-detect)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings only and no progress; the summary goes to stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        "tei_lexicon=debug"
    } else if args.quiet {
        "tei_lexicon=warn"
    } else {
        "tei_lexicon=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if args.quiet {
        config.show_progress = false;
    }

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let mut inputs = Vec::new();
    for (source, given) in [(Source::Ruland, &args.ruland), (Source::Sommerhoff, &args.sommerhoff)] {
        match given.clone().or_else(|| find_source(&cwd, source)) {
            Some(path) => {
                info!("{}: using {}", source, path.display());
                inputs.push((source, path));
            }
            None => warn!("{}: no source document found", source),
        }
    }
    if inputs.is_empty() {
        bail!("no source documents found; pass --ruland and/or --sommerhoff");
    }

    if !args.quiet {
        println!("Output: {}", args.output.display());
        println!("Threads: {}", config.thread_count());
        println!();
    }

    let artifacts = convert(&inputs, &config)?;
    artifacts
        .write(&args.output)
        .with_context(|| format!("writing artifacts to {}", args.output.display()))?;

    if args.quiet {
        write_summary(&mut std::io::stderr().lock(), &artifacts)?;
    } else {
        print_summary(&artifacts);
    }

    if artifacts.collections.is_empty() {
        bail!("every collection failed to convert");
    }
    Ok(())
}
