use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use rids::{IngestConfig, IngestionPipeline, PairingMode, RidsDocument};

/// RIDS – RF interference data system
#[derive(Parser, Debug)]
#[command(name = "rids", version, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drain a capture directory into <time_stamp>.ridz files
    Ingest {
        /// Directory holding <stamp>.ave.<pol> / <stamp>.maxh.<pol> captures
        directory: PathBuf,

        /// Header .rids/.ridz file loaded before ingestion
        #[arg(long)]
        header: Option<PathBuf>,

        /// JSON ingest config; command-line flags override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Header field assignment, e.g. --set "threshold=-80 dBm"
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Comment appended to the document
        #[arg(long)]
        comment: Option<String>,

        /// Peak events per polarization per cycle
        #[arg(long)]
        obs_per_file: Option<usize>,

        /// Maximum number of scan cycles
        #[arg(long)]
        max_loops: Option<usize>,

        /// Pause between cycles in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Require paired captures to carry the same time stamp
        #[arg(long, default_value_t = false)]
        strict_pairing: bool,

        /// Stop once a cycle consumes nothing and the directory is unchanged
        #[arg(long, default_value_t = false)]
        stop_when_idle: bool,
    },
    /// Re-encode a document (.rids <-> .ridz by destination suffix)
    Convert { input: PathBuf, output: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match args.command {
        Command::Ingest {
            directory,
            header,
            config,
            set,
            comment,
            obs_per_file,
            max_loops,
            poll_interval_ms,
            strict_pairing,
            stop_when_idle,
        } => {
            let mut cfg = match config {
                Some(path) => IngestConfig::from_json_file(&path)
                    .with_context(|| format!("loading ingest config {}", path.display()))?,
                None => IngestConfig::default(),
            };
            if let Some(n) = obs_per_file {
                cfg.obs_per_file = n;
            }
            if let Some(n) = max_loops {
                cfg.max_loops = n;
            }
            if let Some(ms) = poll_interval_ms {
                cfg.poll_interval_ms = ms;
            }
            if strict_pairing {
                cfg.pairing = PairingMode::TimeStamp;
            }
            if stop_when_idle {
                cfg.stop_when_idle = true;
            }

            let mut doc = RidsDocument::new();
            if let Some(path) = &header {
                doc.load(path)
                    .with_context(|| format!("loading header {}", path.display()))?;
            }
            doc.set(parse_assignments(&set)?);
            doc.append_comment(comment.as_deref());

            ingest(&mut doc, &directory, cfg)
        }
        Command::Convert { input, output } => {
            let mut doc = RidsDocument::new();
            doc.load(&input)
                .with_context(|| format!("loading {}", input.display()))?;
            doc.save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            log::info!("Converted {} -> {}", input.display(), output.display());
            Ok(())
        }
    }
}

fn ingest(doc: &mut RidsDocument, directory: &Path, cfg: IngestConfig) -> Result<()> {
    log::info!(
        "Ingesting {} (obs_per_file={}, max_loops={})",
        directory.display(),
        cfg.obs_per_file,
        cfg.max_loops
    );
    let pipeline = IngestionPipeline::with_config(cfg);
    let report = pipeline
        .run(doc, directory)
        .with_context(|| format!("ingesting {}", directory.display()))?;

    for failure in &report.failures {
        log::warn!("  {} failed: {}", failure.event, failure.error);
    }
    if !report.pairing_mismatches.is_empty() {
        log::warn!("  {} pairing mismatches", report.pairing_mismatches.len());
    }
    for output in &report.outputs {
        log::info!("  output: {}", output.display());
    }
    Ok(())
}

fn parse_assignments(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => Ok((key.trim().to_string(), value.trim().to_string())),
            None => bail!("expected KEY=VALUE, got '{pair}'"),
        })
        .collect()
}
