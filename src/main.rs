use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use photodup::core::hash::DEFAULT_PROGRESSIVE_STAGES;
use photodup::core::scanner::{self, DEFAULT_EXTENSIONS};
use photodup::core::similarity;
use photodup::{DigestAlgorithm, FeatureRecord, IndexConfig, Organizer, SimilarityIndex, Tier, Verdict};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "photodup", version, about = "Find near-duplicate photos")]
struct Cli {
    #[command(flatten)]
    index: IndexArgs,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// JSON file with index settings
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Score at or above which a file is an exact duplicate
    #[arg(long, global = true)]
    strict_threshold: Option<f64>,
    /// Score at or above which a file is flagged for review
    #[arg(long, global = true)]
    log_threshold: Option<f64>,
    /// Sample budget of the partial fingerprint, in bytes
    #[arg(long, value_name = "BYTES", global = true)]
    partial_bytes: Option<u64>,
    /// Width of a size bucket, in bytes (at least 1024)
    #[arg(long, value_name = "BYTES", global = true)]
    bucket_bytes: Option<u64>,
    /// Fingerprint digest: sha256 or blake3
    #[arg(long, global = true)]
    digest: Option<DigestAlgorithm>,
    /// Fingerprint cache capacity, 0 to disable
    #[arg(long, value_name = "N", global = true)]
    cache_entries: Option<usize>,
}

impl IndexArgs {
    fn resolve(&self) -> Result<IndexConfig> {
        let mut config = match &self.config {
            Some(path) => IndexConfig::from_json_file(path)?,
            None => IndexConfig::default(),
        };

        if let Some(value) = self.strict_threshold {
            config.strict_threshold = value;
        }
        if let Some(value) = self.log_threshold {
            config.log_threshold = value;
        }
        if let Some(value) = self.partial_bytes {
            config.partial_fingerprint_bytes = value;
        }
        if let Some(value) = self.bucket_bytes {
            config.size_bucket_bytes = value;
        }
        if let Some(value) = self.digest {
            config.digest = value;
        }
        if let Some(value) = self.cache_entries {
            config.cache_entries = value;
        }

        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index an existing library and report how many files it holds
    Seed {
        /// Library directory
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Extensions to include (default: common photo and RAW formats)
        #[arg(long = "ext", value_name = "EXT")]
        extensions: Vec<String>,
    },

    /// Find duplicates among new files, optionally against a library
    Scan {
        /// Directory of incoming files
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Library to seed the index from first
        #[arg(long, value_name = "DIR")]
        against: Option<PathBuf>,
        /// Extensions to include (default: common photo and RAW formats)
        #[arg(long = "ext", value_name = "EXT")]
        extensions: Vec<String>,
        /// Print one JSON object per file
        #[arg(long)]
        json: bool,
    },

    /// Print the fingerprint of a file
    Hash {
        #[arg(short, long, value_name = "FILE")]
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = HashMode::Quick)]
        tier: HashMode,
    },

    /// Score two files against each other
    Compare {
        #[arg(value_name = "FILE")]
        first: PathBuf,
        #[arg(value_name = "FILE")]
        second: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum HashMode {
    Quick,
    Standard,
    Thorough,
    Full,
    Progressive,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.index.resolve()?;
    let index = SimilarityIndex::new(config).context("Invalid index configuration")?;

    match cli.command {
        Commands::Seed { path, extensions } => {
            println!("▶ Seeding index from: {}", path.display());
            let extensions = extensions_or_default(extensions);
            let (added, skipped) = benchmark("seeding", || seed(&index, &path, &extensions));
            println!("✅ Indexed {} file(s), skipped {}", added, skipped);
        }

        Commands::Scan {
            path,
            against,
            extensions,
            json,
        } => {
            let extensions = extensions_or_default(extensions);

            if let Some(library) = &against {
                println!("▶ Seeding index from: {}", library.display());
                let (added, skipped) = benchmark("seeding", || seed(&index, library, &extensions));
                println!("   Indexed {} existing file(s), skipped {}", added, skipped);
            }

            println!("▶ Scanning for duplicates in: {}", path.display());
            let files = scan_directory(&path, &extensions)?;

            let bar = ProgressBar::new(files.len() as u64);
            bar.set_style(ProgressStyle::with_template(
                "{bar:40.green/white} {pos}/{len} {msg} [{elapsed_precise}]",
            )?);
            let tick = bar.clone();
            let organizer = Organizer::new(&index)
                .with_dimension_probe(probe_dimensions)
                .with_decision_callback(move |_| tick.inc(1));

            let decisions = benchmark("matching all files", || organizer.process(&files))?;
            bar.finish_and_clear();

            if json {
                for decision in &decisions {
                    println!("{}", serde_json::to_string(decision)?);
                }
            } else {
                report(&decisions);
            }

            let progress = organizer.progress();
            println!(
                "\n✅ {} file(s): {} distinct, {} probable, {} duplicate, {} error(s)",
                progress.processed,
                progress.distinct,
                progress.probable,
                progress.duplicates,
                progress.errors
            );
            if let Some(cache) = index.cache() {
                log::debug!("Fingerprint cache: {:?}", cache.stats());
            }
        }

        Commands::Hash { path, tier } => {
            let fingerprints = index.fingerprints();
            let digest = match tier {
                HashMode::Quick => fingerprints.tier(&path, Tier::Quick),
                HashMode::Standard => fingerprints.tier(&path, Tier::Standard),
                HashMode::Thorough => fingerprints.tier(&path, Tier::Thorough),
                HashMode::Full => fingerprints.full_read(&path),
                HashMode::Progressive => {
                    let stages = fingerprints.progressive_hash(&path, &DEFAULT_PROGRESSIVE_STAGES);
                    if stages.is_empty() {
                        anyhow::bail!("Could not fingerprint {}", path.display());
                    }
                    for stage in stages {
                        println!("{:>6}  {}  {}", stage.stage, stage.digest, path.display());
                    }
                    return Ok(());
                }
            };

            let digest = digest.with_context(|| format!("Could not fingerprint {}", path.display()))?;
            println!("{}  {}", digest, path.display());
        }

        Commands::Compare { first, second } => {
            let left = build(&index, &first)?;
            let right = build(&index, &second)?;

            for contribution in similarity::breakdown(&left, &right) {
                println!(
                    "   {:<14} {:>6.2} / {:>5.1}",
                    format!("{:?}", contribution.signal),
                    contribution.points,
                    contribution.weight
                );
            }

            let score = similarity::score(&left, &right);
            println!("▶ Score {:.2} → {:?}", score, index.classify(score));
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn extensions_or_default(extensions: Vec<String>) -> Vec<String> {
    if extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
    } else {
        extensions
    }
}

/// Seed `index` from `dir`, returning (added, skipped).
fn seed(index: &SimilarityIndex, dir: &Path, extensions: &[String]) -> (usize, usize) {
    let skipped = AtomicUsize::new(0);
    let count_skip = |_: &str| {
        skipped.fetch_add(1, Ordering::Relaxed);
    };
    let added = index.seed_from_directory(dir, extensions, Some(&count_skip));
    (added, skipped.into_inner())
}

/// Recursively walk `dir`, returning supported photo paths.
fn scan_directory(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let files = scanner::discover_files(dir, extensions)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    spinner.finish_with_message(format!("Scan complete: {} file(s)", files.len()));
    Ok(files)
}

/// Pixel dimensions read from the image header, if the format is known.
fn probe_dimensions(path: &Path) -> Option<(u32, u32)> {
    match image::image_dimensions(path) {
        Ok(dimensions) => Some(dimensions),
        Err(e) => {
            log::debug!("Could not read dimensions for {}: {}", path.display(), e);
            None
        }
    }
}

fn build(index: &SimilarityIndex, path: &Path) -> Result<FeatureRecord> {
    let (width, height) = match probe_dimensions(path) {
        Some((w, h)) => (Some(w), Some(h)),
        None => (None, None),
    };
    index
        .build_record(path, width, height, None, None)
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn report(decisions: &[photodup::Decision]) {
    for (label, verdict) in [
        ("📦 Duplicate", Verdict::Duplicate),
        ("🔎 Probable duplicate", Verdict::Probable),
    ] {
        let matches: Vec<_> = decisions
            .iter()
            .filter(|d| d.verdict == Some(verdict))
            .collect();
        if matches.is_empty() {
            continue;
        }

        println!("\n✨ {} file(s) classified {:?}:", matches.len(), verdict);
        for decision in matches {
            println!(
                "   {} {} ≈ {} ({:.2})",
                label,
                decision.source_path,
                decision.matched_path.as_deref().unwrap_or("?"),
                decision.score
            );
        }
    }

    for decision in decisions.iter().filter(|d| d.error.is_some()) {
        eprintln!(
            "⚠️  {}: {}",
            decision.source_path,
            decision.error.as_deref().unwrap_or_default()
        );
    }
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
