//! Trial driver and two-level parameter learning.
//!
//! A trial visits every corpus tuple in order and runs [`infer_factor`] on its
//! factor. After the pass, [`Model::adjust_parameters`] recomputes omegas for
//! every factor and then alphas for every node; alphas read the best partitions
//! that the omega step just selected.

use crate::corpus::Tuple;
use crate::engine::errors::YomiError;
use crate::engine::inference::{infer_factor, SelectionOrder};
use crate::engine::model::Model;

/// Configuration for training.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LearnerConfig {
    /// Number of trials run by [`train`].
    pub trials: usize,
    /// Per-factor propagation budget.
    pub max_iterations: usize,
    /// Additive smoothing used when re-weighting partitions.
    pub omega_smoothing: f64,
    /// Probability of unseen readings before the first reset.
    pub initial_smoothing: f64,
    /// Probability of unseen readings after a reset.
    pub reset_smoothing: f64,
    /// Readings at or below this probability are dropped on reset.
    pub reset_threshold: f64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            trials: 3,
            max_iterations: 30,
            omega_smoothing: 0.5,
            initial_smoothing: 0.1,
            reset_smoothing: 0.001,
            reset_threshold: 0.01,
        }
    }
}

impl LearnerConfig {
    pub fn validate(self) -> Result<Self, YomiError> {
        if self.trials == 0 {
            return Err(YomiError::Validation("trials must be > 0".into()));
        }
        if self.max_iterations == 0 {
            return Err(YomiError::Validation("max_iterations must be > 0".into()));
        }
        for (name, value) in [
            ("omega_smoothing", self.omega_smoothing),
            ("initial_smoothing", self.initial_smoothing),
            ("reset_smoothing", self.reset_smoothing),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(YomiError::Validation(format!(
                    "{} must be finite and >= 0",
                    name
                )));
            }
        }
        if !(0.0..1.0).contains(&self.reset_threshold) {
            return Err(YomiError::Validation(
                "reset_threshold must be in [0, 1)".into(),
            ));
        }
        Ok(self)
    }
}

/// Position within a running trial, reported after each corpus tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialProgress {
    pub trial: usize,
    /// Number of tuples processed so far (1-based).
    pub processed: usize,
    pub total: usize,
}

impl TrialProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Outcome of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TrialSummary {
    pub trial: usize,
    /// Corpus positions visited.
    pub tuples: usize,
    /// Positions whose propagation emptied its queue before the cap.
    pub converged: usize,
    /// Propagation steps (node recomputations) across the whole trial.
    pub iterations: usize,
}

impl Model {
    /// Runs one full trial followed by parameter adjustment.
    pub fn run_trial<S: SelectionOrder + ?Sized>(
        &mut self,
        corpus: &[Tuple],
        order: &mut S,
    ) -> Result<TrialSummary, YomiError> {
        self.run_trial_with(corpus, order, |_, _| {})
    }

    /// Runs one trial, calling `on_progress` after every corpus tuple.
    ///
    /// An empty model builds factors and nodes from `corpus`. Otherwise the trial
    /// revisits the registered factors (resetting node distributions after the
    /// first trial), and `corpus` must match the registered tuples one for one.
    pub fn run_trial_with<S, F>(
        &mut self,
        corpus: &[Tuple],
        order: &mut S,
        mut on_progress: F,
    ) -> Result<TrialSummary, YomiError>
    where
        S: SelectionOrder + ?Sized,
        F: FnMut(&TrialProgress, &Model),
    {
        let trial = self.trials_completed();
        let build = self.corpus_order().is_empty();
        if !build {
            self.check_corpus(trial, corpus)?;
        }
        if trial > 0 {
            self.reset_distributions();
        }

        #[cfg(feature = "tracing")]
        tracing::info!("start trial {} over {} tuples", trial, corpus.len());

        let mut summary = TrialSummary {
            trial,
            tuples: corpus.len(),
            converged: 0,
            iterations: 0,
        };

        for (position, tuple) in corpus.iter().enumerate() {
            let factor = if build {
                self.register(&tuple.word, &tuple.reading)
            } else {
                self.corpus_order()[position]
            };

            let diagnostics = infer_factor(self, factor, order)?;
            summary.iterations += diagnostics.iterations_run;
            if diagnostics.converged {
                summary.converged += 1;
            }

            let progress = TrialProgress {
                trial,
                processed: position + 1,
                total: corpus.len(),
            };
            on_progress(&progress, self);
        }

        self.adjust_parameters()?;
        self.finish_trial();

        #[cfg(feature = "tracing")]
        tracing::info!(
            "finish trial {}: {}/{} factors converged, {} steps",
            trial,
            summary.converged,
            summary.tuples,
            summary.iterations
        );

        Ok(summary)
    }

    fn check_corpus(&self, trial: usize, corpus: &[Tuple]) -> Result<(), YomiError> {
        if corpus.len() != self.corpus_order().len() {
            return Err(YomiError::Validation(format!(
                "trial {} got {} tuples, model was built from {}",
                trial,
                corpus.len(),
                self.corpus_order().len()
            )));
        }
        for (position, (tuple, id)) in corpus.iter().zip(self.corpus_order()).enumerate() {
            let factor = self.factor(*id).ok_or_else(|| {
                YomiError::Internal(format!("missing factor {:?}", id))
            })?;
            if factor.word() != tuple.word || factor.reading() != tuple.reading {
                return Err(YomiError::Validation(format!(
                    "trial {} tuple {} is '{}', model was built with '{} {}'",
                    trial,
                    position + 1,
                    tuple,
                    factor.word(),
                    factor.reading()
                )));
            }
        }
        Ok(())
    }

    /// Updates omegas on every factor, then alphas on every node. The order matters:
    /// alphas are computed from the best partitions chosen by the omega step.
    pub fn adjust_parameters(&mut self) -> Result<(), YomiError> {
        self.update_omegas()?;
        self.update_alphas()?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "updated weight vectors for {} factors and {} nodes",
            self.factors().len(),
            self.nodes().len()
        );

        Ok(())
    }
}

/// Builds a model and runs `config.trials` trials over `corpus`.
pub fn train<S: SelectionOrder + ?Sized>(
    corpus: &[Tuple],
    config: LearnerConfig,
    order: &mut S,
) -> Result<(Model, Vec<TrialSummary>), YomiError> {
    let mut model = Model::new(config)?;
    let mut summaries = Vec::with_capacity(config.trials);
    for _ in 0..config.trials {
        summaries.push(model.run_trial(corpus, order)?);
    }
    Ok((model, summaries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::distribution::WEIGHT_CEILING;
    use crate::engine::inference::FirstInQueue;

    fn corpus(pairs: &[(&str, &str)]) -> Vec<Tuple> {
        pairs.iter().map(|(w, r)| Tuple::new(*w, *r)).collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(LearnerConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            LearnerConfig {
                max_iterations: 0,
                ..LearnerConfig::default()
            },
            LearnerConfig {
                trials: 0,
                ..LearnerConfig::default()
            },
            LearnerConfig {
                omega_smoothing: f64::NAN,
                ..LearnerConfig::default()
            },
            LearnerConfig {
                reset_threshold: 1.0,
                ..LearnerConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(YomiError::Validation(_))));
        }
    }

    #[test]
    fn first_trial_populates_weights() {
        let data = corpus(&[("大人", "おとな"), ("人", "ひと"), ("大", "おお")]);
        let mut model = Model::new(LearnerConfig::default()).expect("config");
        let summary = model.run_trial(&data, &mut FirstInQueue).expect("trial");
        assert_eq!(summary.trial, 0);
        assert_eq!(summary.tuples, 3);
        assert_eq!(model.trials_completed(), 1);

        for factor in model.factors() {
            assert_eq!(factor.omegas().len(), factor.partitions().len());
            let max = factor.omegas().iter().copied().fold(0.0, f64::max);
            assert!((max - WEIGHT_CEILING).abs() < 1e-9);
            assert!(factor.best_partition().is_some());
        }
        for node in model.nodes().iter() {
            assert_eq!(node.alphas().len(), node.factors().len());
        }
    }

    #[test]
    fn later_trial_rejects_different_corpus() {
        let data = corpus(&[("火", "ひ")]);
        let mut model = Model::new(LearnerConfig::default()).expect("config");
        model.run_trial(&data, &mut FirstInQueue).expect("trial");
        let longer = corpus(&[("火", "ひ"), ("山", "やま")]);
        assert!(matches!(
            model.run_trial(&longer, &mut FirstInQueue),
            Err(YomiError::Validation(_))
        ));
    }

    #[test]
    fn later_trial_rejects_same_length_corpus_with_other_tuples() {
        let mut model = Model::new(LearnerConfig::default()).expect("config");
        model
            .run_trial(&corpus(&[("火", "ひ")]), &mut FirstInQueue)
            .expect("trial");
        let err = model
            .run_trial(&corpus(&[("山", "やま")]), &mut FirstInQueue)
            .unwrap_err();
        assert!(matches!(err, YomiError::Validation(_)));
        assert!(model.node('山').is_none());
        assert_eq!(model.trials_completed(), 1);
        assert_eq!(model.node('火').expect("node").smoothing(), 0.1);
    }

    #[test]
    fn pre_registered_corpus_is_not_registered_twice() {
        let data = corpus(&[("火", "ひ"), ("火山", "かざん")]);
        let mut model = Model::new(LearnerConfig::default()).expect("config");
        for tuple in &data {
            model.register(&tuple.word, &tuple.reading);
        }
        model.run_trial(&data, &mut FirstInQueue).expect("first trial");
        assert_eq!(model.corpus_order().len(), 2);
        model.run_trial(&data, &mut FirstInQueue).expect("second trial");
        assert_eq!(model.trials_completed(), 2);

        let reordered = corpus(&[("火山", "かざん"), ("火", "ひ")]);
        assert!(matches!(
            model.run_trial(&reordered, &mut FirstInQueue),
            Err(YomiError::Validation(_))
        ));
    }

    #[test]
    fn alphas_dilute_consensus_votes() {
        // 火山 and 火事 both vote か; 火 alone votes ひ.
        let data = corpus(&[("火山", "かざん"), ("火事", "かじ"), ("火", "ひ")]);
        let mut model = Model::new(LearnerConfig::default()).expect("config");
        model.run_trial(&data, &mut FirstInQueue).expect("trial");

        let fire = model.node('火').expect("node");
        let names: Vec<&str> = fire
            .factors()
            .iter()
            .map(|id| model.factor(*id).expect("factor").word())
            .collect();
        assert_eq!(names, vec!["火山", "火事", "火"]);
        // 1/(2+1), 1/(2+1), 1/(1+1) rescaled so the largest is 10.
        let expected = [20.0 / 3.0, 20.0 / 3.0, WEIGHT_CEILING];
        assert_eq!(fire.alphas().len(), expected.len());
        for (alpha, want) in fire.alphas().iter().zip(expected) {
            assert!((alpha - want).abs() < 1e-9, "alpha {} != {}", alpha, want);
        }
    }

    #[test]
    fn later_trial_lowers_smoothing() {
        let data = corpus(&[("火", "ひ")]);
        let (model, summaries) =
            train(&data, LearnerConfig::default(), &mut FirstInQueue).expect("train");
        assert_eq!(summaries.len(), 3);
        let fire = model.node('火').expect("node");
        assert_eq!(fire.smoothing(), 0.001);
        assert_eq!(fire.prob("ひ"), 1.0);
    }

    #[test]
    fn progress_reports_every_tuple() {
        let data = corpus(&[("火", "ひ"), ("山", "やま"), ("火山", "かざん")]);
        let mut model = Model::new(LearnerConfig::default()).expect("config");
        let mut seen = Vec::new();
        model
            .run_trial_with(&data, &mut FirstInQueue, |progress, m| {
                seen.push((progress.processed, m.factors().len()));
            })
            .expect("trial");
        assert_eq!(seen, vec![(1, 1), (2, 2), (3, 3)]);
    }
}
