//! Yomi CLI - learn kanji readings from (word, reading) pairs
//!
//! Usage:
//!   yomi train --corpus tuples.txt --test test.txt     # Train and evaluate
//!   yomi partition --corpus tuples.txt                 # Show candidate partitions
//!   yomi baseline --test test.txt                      # Score the length prior alone
//!   yomi prepare --corpus-dir corpus --tuples tuples.txt --test test.txt

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use yomi_cli::{write_evaluations, write_trial_reports, ProgressLog, ReportFormat};
use yomi_core::corpus::{format_tuples, sample_test_candidates};
use yomi_core::evaluation::{evaluate_baseline, evaluate_model};
use yomi_core::{
    parse_test_cases, parse_tuples, partition, prepare_corpus, LearnerConfig, Model, TestCase,
    TestStatistics, TrialSummary, Tuple,
};

#[derive(Parser)]
#[command(name = "yomi")]
#[command(version)]
#[command(about = "Yomi - kanji reading inference by loopy belief propagation")]
#[command(
    long_about = "Learn per-character reading distributions from (word, reading) pairs and evaluate them"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model over a tuple corpus
    Train(TrainArgs),
    /// Print every candidate partition of each corpus tuple
    Partition {
        #[arg(long, value_name = "FILE")]
        corpus: PathBuf,
    },
    /// Evaluate a test set with the reading-length prior only
    Baseline {
        #[arg(long, value_name = "FILE")]
        test: PathBuf,
        #[arg(short, long, default_value = "result", value_name = "DIR")]
        output: PathBuf,
    },
    /// Build a cleaned tuple corpus and sample test candidates
    Prepare(PrepareArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Tuple corpus, one `word reading` per line
    #[arg(long, value_name = "FILE")]
    corpus: PathBuf,

    /// Annotated test set, one `word r1,r2,...` per line
    #[arg(long, value_name = "FILE")]
    test: Option<PathBuf>,

    /// Directory receiving per-trial reports
    #[arg(short, long, default_value = "result", value_name = "DIR")]
    output: PathBuf,

    #[arg(long, default_value_t = 3)]
    trials: usize,

    /// Propagation budget per corpus tuple
    #[arg(long, default_value_t = 30)]
    max_iterations: usize,

    /// Seed for the node selection order (entropy when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Evaluate the test set every N tuples and append to test_log.txt
    #[arg(long, value_name = "N")]
    test_interval: Option<usize>,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: ReportFormat,
}

#[derive(Args)]
struct PrepareArgs {
    /// Directory of raw tuple files; `*.txt` not starting with `_` are read
    #[arg(long, value_name = "DIR")]
    corpus_dir: PathBuf,

    /// Destination of the cleaned corpus
    #[arg(long, value_name = "FILE")]
    tuples: PathBuf,

    /// Destination of sampled test candidates; left alone if it exists
    #[arg(long, value_name = "FILE")]
    test: PathBuf,

    #[arg(long, default_value_t = 100)]
    sample: usize,

    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Train(args) => train(args),
        Command::Partition { corpus } => print_partitions(&corpus),
        Command::Baseline { test, output } => baseline(&test, &output),
        Command::Prepare(args) => prepare(args),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn read_tuples(path: &Path) -> Result<Vec<Tuple>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading '{}'", path.display()))?;
    parse_tuples(&text).with_context(|| format!("parsing '{}'", path.display()))
}

fn read_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading '{}'", path.display()))?;
    parse_test_cases(&text).with_context(|| format!("parsing '{}'", path.display()))
}

fn seeded(seed: Option<u64>) -> ChaCha20Rng {
    match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    }
}

/// Machine-readable run summary written with `--format json`.
#[derive(Serialize)]
struct RunSummary {
    config: LearnerConfig,
    trials: Vec<TrialSummary>,
    tests: Vec<TestStatistics>,
}

fn train(args: TrainArgs) -> Result<()> {
    let corpus = read_tuples(&args.corpus)?;
    if corpus.is_empty() {
        bail!("corpus '{}' has no tuples", args.corpus.display());
    }
    let cases = match &args.test {
        Some(path) => read_test_cases(path)?,
        None => Vec::new(),
    };

    let config = LearnerConfig {
        trials: args.trials,
        max_iterations: args.max_iterations,
        ..LearnerConfig::default()
    };
    let mut model = Model::new(config).context("invalid training configuration")?;
    let mut rng = seeded(args.seed);

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory '{}'", args.output.display()))?;
    let mut log = ProgressLog::new(args.output.join("test_log.txt"));

    tracing::info!(
        "training on {} tuples, {} test cases, {} trials",
        corpus.len(),
        cases.len(),
        config.trials
    );

    let mut summary = RunSummary {
        config,
        trials: Vec::with_capacity(config.trials),
        tests: Vec::new(),
    };
    let mut previous_confidence: Option<f64> = None;

    for _ in 0..config.trials {
        let mut log_error: Option<anyhow::Error> = None;
        let trial = model.run_trial_with(&corpus, &mut rng, |progress, model| {
            let due = matches!(args.test_interval, Some(n) if n > 0 && progress.processed % n == 0);
            if !due || cases.is_empty() || log_error.is_some() {
                return;
            }
            let stats = TestStatistics::from_evaluations(&evaluate_model(&cases, model));
            if let Err(e) = log.record(progress.trial, progress.processed, &stats) {
                log_error = Some(e);
            }
            tracing::debug!(
                "trial {} at {:.0}%: {}",
                progress.trial,
                progress.fraction() * 100.0,
                stats
            );
        })?;
        if let Some(e) = log_error {
            return Err(e);
        }

        println!(
            "Trial {}: {}/{} tuples converged, {} propagation steps",
            trial.trial, trial.converged, trial.tuples, trial.iterations
        );
        let written = write_trial_reports(&args.output, trial.trial, &model, args.format)?;
        tracing::info!("wrote {} report files", written.len());

        if !cases.is_empty() {
            let evaluations = evaluate_model(&cases, &model);
            write_evaluations(&args.output.join("test_result.txt"), &evaluations)?;
            let stats = TestStatistics::from_evaluations(&evaluations);
            match previous_confidence {
                Some(previous) => println!(
                    "  {} confidence {:.3} ({:+.3})",
                    stats,
                    stats.confidence,
                    stats.confidence - previous
                ),
                None => println!("  {} confidence {:.3}", stats, stats.confidence),
            }
            previous_confidence = Some(stats.confidence);
            summary.tests.push(stats);
        }
        summary.trials.push(trial);
    }

    if args.format == ReportFormat::Json {
        let path = args.output.join("summary.json");
        let json = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
        fs::write(&path, json).with_context(|| format!("writing '{}'", path.display()))?;
    }
    Ok(())
}

fn print_partitions(corpus: &Path) -> Result<()> {
    for tuple in read_tuples(corpus)? {
        println!("--- ({}) ---", tuple);
        let partitions = partition(&tuple.word, &tuple.reading);
        if partitions.is_empty() {
            println!("  (no partition)");
        }
        for p in &partitions {
            println!("  {}", p);
        }
    }
    Ok(())
}

fn baseline(test: &Path, output: &Path) -> Result<()> {
    let cases = read_test_cases(test)?;
    let evaluations = evaluate_baseline(&cases);
    fs::create_dir_all(output)
        .with_context(|| format!("creating output directory '{}'", output.display()))?;
    write_evaluations(&output.join("baseline_test_result.txt"), &evaluations)?;

    let stats = TestStatistics::from_evaluations(&evaluations);
    println!("Baseline {} confidence {:.3}", stats, stats.confidence);
    Ok(())
}

fn prepare(args: PrepareArgs) -> Result<()> {
    let mut sources: Vec<PathBuf> = fs::read_dir(&args.corpus_dir)
        .with_context(|| format!("listing '{}'", args.corpus_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let is_text = path.extension().map_or(false, |ext| ext == "txt");
            let skipped = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with('_'));
            is_text && !skipped
        })
        .collect();
    sources.sort();

    let mut raw = Vec::new();
    for source in &sources {
        raw.extend(read_tuples(source)?);
    }
    let tuples = prepare_corpus(&raw);
    tracing::info!(
        "kept {} of {} tuples from {} files",
        tuples.len(),
        raw.len(),
        sources.len()
    );
    fs::write(&args.tuples, format_tuples(&tuples))
        .with_context(|| format!("writing '{}'", args.tuples.display()))?;

    if args.test.exists() {
        tracing::info!("'{}' exists, not sampling", args.test.display());
        return Ok(());
    }
    let mut rng = seeded(args.seed);
    let candidates = sample_test_candidates(&tuples, args.sample, &mut rng);
    fs::write(&args.test, format_tuples(&candidates))
        .with_context(|| format!("writing '{}'", args.test.display()))?;
    println!(
        "Sampled {} test candidates into '{}'; annotate them as `word r1,r2,...`",
        candidates.len(),
        args.test.display()
    );
    Ok(())
}
