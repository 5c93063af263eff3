//! File output for trial reports, evaluation results and the continuous-testing log.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use yomi_core::{Evaluation, Model, TestStatistics};

/// Report encoding selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable line format.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Writes the per-trial node and factor reports into `dir`, returning the paths written.
pub fn write_trial_reports(
    dir: &Path,
    trial: usize,
    model: &Model,
    format: ReportFormat,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory '{}'", dir.display()))?;

    let nodes = model.node_reports();
    let factors = model.factor_reports();
    match format {
        ReportFormat::Text => {
            let distribution = dir.join(format!("distribution_{}.txt", trial));
            write_lines(&distribution, nodes.iter().map(|n| n.to_string()))?;

            let partitions = dir.join(format!("partitions_{}.txt", trial));
            write_lines(&partitions, factors.iter().map(|f| f.to_string()))?;

            let alphas = dir.join(format!("alphas_{}.txt", trial));
            write_lines(&alphas, nodes.iter().map(|n| n.alpha_line().to_string()))?;

            Ok(vec![distribution, partitions, alphas])
        }
        ReportFormat::Json => {
            let node_path = dir.join(format!("nodes_{}.json", trial));
            write_json(&node_path, &nodes)?;

            let factor_path = dir.join(format!("factors_{}.json", trial));
            write_json(&factor_path, &factors)?;

            Ok(vec![node_path, factor_path])
        }
    }
}

/// Writes every evaluation, one block per test case.
pub fn write_evaluations(path: &Path, evaluations: &[Evaluation]) -> Result<()> {
    write_lines(path, evaluations.iter().map(|e| e.to_string()))
}

fn write_lines<I>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = String>,
{
    let file = File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line).with_context(|| format!("writing '{}'", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("writing '{}'", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("serializing '{}'", path.display()))
}

/// Append-only log of accuracy measured while a trial is running.
#[derive(Debug)]
pub struct ProgressLog {
    path: PathBuf,
    initialized: bool,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            initialized: false,
        }
    }

    /// Appends `trial tuple accuracy% confidence`, truncating the file on first use.
    pub fn record(&mut self, trial: usize, processed: usize, stats: &TestStatistics) -> Result<()> {
        if !self.initialized {
            fs::write(&self.path, "==== Continuous Performance Testing Log ====\n")
                .with_context(|| format!("creating '{}'", self.path.display()))?;
            self.initialized = true;
        }
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening '{}'", self.path.display()))?;
        writeln!(
            file,
            "{} {} {:.1}% {:.3}",
            trial,
            processed,
            stats.accuracy(),
            stats.confidence
        )
        .with_context(|| format!("writing '{}'", self.path.display()))
    }
}
