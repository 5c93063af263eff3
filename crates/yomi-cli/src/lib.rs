//! Support code for the `yomi` binary: report files and logs.

pub mod output;

pub use output::{write_evaluations, write_trial_reports, ProgressLog, ReportFormat};
