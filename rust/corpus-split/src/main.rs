// rust/corpus-split/src/main.rs

//! Corpus Split command line tool
//!
//! Splits an indexed corpus into a train and a validation partition, each
//! written as one compressed shard group per worker.
//!
//! # Usage
//!
//! ```bash
//! # Split a shard dataset with the defaults (train/ and valid/ in the cwd)
//! corpus-split --in_path corpus
//!
//! # Split JSONL input into zstd shards, 8 workers, merged root indexes
//! corpus-split --in_path corpus.jsonl --input_format jsonl \
//!     --compression zstd --num_workers 8 --merge
//!
//! # Take settings from a file, overriding the seed
//! corpus-split --in_path corpus --config split.toml --seed 7
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use corpus_core::config::SplitConfig;
use corpus_core::{
    CorpusError, IndexedDataset, JsonlDataset, LocalStorage, SamplingStrategy, ShardedDataset,
    SplitSummary, Splitter, StorageBackend,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// A shard group, or a partition root of worker groups
    Shards,
    /// Newline-delimited JSON objects with a "tokens" or "text" key
    Jsonl,
}

/// Deterministic train/validation corpus splitter
///
/// Options left unset fall back to `CORPUS_*` environment variables, then
/// to the config file, then to the built-in defaults shown below.
#[derive(Parser, Debug)]
#[command(name = "corpus-split", version)]
struct Args {
    /// Input dataset path
    #[arg(long = "in_path")]
    in_path: PathBuf,

    /// Output root of the left (train) partition [default: train]
    #[arg(long = "left_path")]
    left_path: Option<PathBuf>,

    /// Output root of the right (valid) partition [default: valid]
    #[arg(long = "right_path")]
    right_path: Option<PathBuf>,

    /// Per-item probability of landing in the right partition [default: 0.001]
    #[arg(long = "right_prob")]
    right_prob: Option<f64>,

    /// Cap on the expected size of the right partition [default: 1000]
    #[arg(long = "right_max")]
    right_max: Option<usize>,

    /// Sampler seed [default: 24301]
    #[arg(long)]
    seed: Option<u64>,

    /// Shard compression: none, lz4 or zstd [default: none]
    #[arg(long)]
    compression: Option<String>,

    /// Writer threads per partition [default: 4]
    #[arg(long = "num_workers")]
    num_workers: Option<usize>,

    /// Input format
    #[arg(long = "input_format", value_enum, default_value = "shards")]
    input_format: InputFormat,

    /// Sampling strategy: geometric or bernoulli [default: geometric]
    #[arg(long)]
    strategy: Option<String>,

    /// Merge worker groups under a root index.json per partition
    #[arg(long)]
    merge: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log_level", default_value = "info")]
    log_level: String,
}

impl Args {
    /// Resolves the effective configuration.
    ///
    /// Later layers win: defaults, config file, env, flags. Validation runs
    /// once on the result, so a flag can correct a bad value in the file.
    fn resolve_config(&self) -> Result<SplitConfig, CorpusError> {
        let base = match &self.config {
            Some(path) => SplitConfig::from_file(path)?,
            None => SplitConfig::default(),
        };
        let mut config = base.with_env_overrides();

        if let Some(path) = &self.left_path {
            config.output.left_path = path.clone();
        }
        if let Some(path) = &self.right_path {
            config.output.right_path = path.clone();
        }
        if let Some(prob) = self.right_prob {
            config.split.right_prob = prob;
        }
        if let Some(max) = self.right_max {
            config.split.right_max = max;
        }
        if let Some(seed) = self.seed {
            config.split.seed = seed;
        }
        if let Some(compression) = &self.compression {
            config.output.compression = compression.to_lowercase();
        }
        if let Some(workers) = self.num_workers {
            config.split.num_workers = workers;
        }
        if let Some(strategy) = &self.strategy {
            config.split.strategy = strategy.parse::<SamplingStrategy>()?;
        }
        if self.merge {
            config.output.merge = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(args: &Args) -> Result<SplitSummary, CorpusError> {
    let config = args.resolve_config()?;
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);

    let dataset: Box<dyn IndexedDataset> = match args.input_format {
        InputFormat::Shards => Box::new(ShardedDataset::with_cache(
            storage.clone(),
            &args.in_path,
            config.split.num_workers.saturating_add(1),
        )?),
        InputFormat::Jsonl => Box::new(JsonlDataset::open(storage.clone(), &args.in_path)?),
    };

    tracing::info!(
        input = %args.in_path.display(),
        format = ?args.input_format,
        samples = dataset.len(),
        left = %config.output.left_path.display(),
        right = %config.output.right_path.display(),
        "starting split"
    );

    Splitter::new(storage, config).run(dataset.as_ref())
}

/// The error followed by each of its causes.
fn error_chain(e: &CorpusError) -> Vec<String> {
    let mut lines = vec![e.to_string()];
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        lines.push(cause.to_string());
        source = cause.source();
    }
    lines
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&args) {
        Ok(summary) => {
            println!("total samples: {}", summary.total);
            println!("train samples: {}", summary.left);
            println!("valid samples: {}", summary.right);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "split failed");
            let mut lines = error_chain(&e).into_iter();
            if let Some(first) = lines.next() {
                eprintln!("error: {first}");
            }
            for cause in lines {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("corpus-split").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_underscore_flags() {
        let args = parse(&[
            "--in_path",
            "data",
            "--right_prob",
            "0.5",
            "--right_max",
            "7",
            "--num_workers",
            "2",
            "--input_format",
            "jsonl",
        ]);
        assert_eq!(args.in_path, PathBuf::from("data"));
        assert_eq!(args.input_format, InputFormat::Jsonl);

        let config = args.resolve_config().unwrap();
        assert_eq!(config.split.right_prob, 0.5);
        assert_eq!(config.split.right_max, 7);
        assert_eq!(config.split.num_workers, 2);
    }

    #[test]
    fn test_in_path_required() {
        assert!(Args::try_parse_from(["corpus-split"]).is_err());
    }

    #[test]
    fn test_bad_values_fail_validation() {
        assert!(parse(&["--in_path", "d", "--right_prob", "2.0"])
            .resolve_config()
            .is_err());
        assert!(parse(&["--in_path", "d", "--compression", "gzip"])
            .resolve_config()
            .is_err());
        assert!(parse(&["--in_path", "d", "--strategy", "stratified"])
            .resolve_config()
            .is_err());
    }

    #[test]
    fn test_flags_correct_config_file_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("split.toml");
        std::fs::write(
            &path,
            "[split]\nright_prob = 2.0\nseed = 9\n\n[output]\ncompression = \"LZ4\"\n",
        )
        .unwrap();
        let path = path.to_str().unwrap();

        assert!(parse(&["--in_path", "d", "--config", path])
            .resolve_config()
            .is_err());

        let config = parse(&["--in_path", "d", "--config", path, "--right_prob", "0.25"])
            .resolve_config()
            .unwrap();
        assert_eq!(config.split.right_prob, 0.25);
        assert_eq!(config.split.seed, 9);
        assert_eq!(config.output.compression, "LZ4");
    }

    #[test]
    fn test_error_chain_has_no_repeats() {
        let err = CorpusError::worker(
            "train",
            3,
            CorpusError::dataset("corpus", "index 12 out of range"),
        );
        let lines = error_chain(&err);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Worker 3"));
        assert!(!lines[0].contains("index 12 out of range"));
        assert!(lines[1].contains("index 12 out of range"));
    }
}
