//! # Evaluation
//!
//! Scores held-out, annotated tuples against a trained [`Model`] (or against the
//! length prior alone) without retraining.
//!
//! A test line is `word r1,r2,...`: the word followed by one comma-separated
//! reading per character, phonetic characters reading as themselves.
//!
//! Each candidate partition gets a belief: the product of the model's
//! probabilities for its inferred segments, rescaled so the best is 10. The
//! prediction is the highest belief, ties broken by the length prior and then
//! by partition order. Confidence is the margin over the runner-up.

use std::fmt;

use crate::engine::distribution::{rescale_to_ceiling, Reading, WEIGHT_CEILING};
use crate::engine::errors::YomiError;
use crate::engine::model::Model;
use crate::segment::{omega_heuristics, partition, Partition};

/// Penalty multiplier applied to the confidence of wrong predictions.
const WRONG_CONFIDENCE_PENALTY: f64 = 3.0;

/// One annotated held-out tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub word: String,
    /// Concatenated reading.
    pub reading: String,
    /// Expected reading for each character of `word`.
    pub expected: Vec<Reading>,
}

impl TestCase {
    /// Parses `word r1,r2,...` (1-based `line` for error reporting).
    pub fn parse(line: usize, text: &str) -> Result<Self, YomiError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let [word, annotated] = tokens.as_slice() else {
            return Err(YomiError::corpus(
                line,
                format!("expected 2 tokens, found {}", tokens.len()),
            ));
        };
        let expected: Vec<Reading> = annotated.split(',').map(Reading::from).collect();
        let characters = word.chars().count();
        if expected.len() != characters {
            return Err(YomiError::corpus(
                line,
                format!(
                    "'{}' has {} characters but {} readings",
                    word,
                    characters,
                    expected.len()
                ),
            ));
        }
        Ok(Self {
            word: (*word).to_owned(),
            reading: expected.iter().map(|r| &**r).collect(),
            expected,
        })
    }

    /// Scores this case with the model's beliefs.
    pub fn evaluate(&self, model: &Model) -> Evaluation {
        let partitions = partition(&self.word, &self.reading);
        let mut beliefs = Vec::with_capacity(partitions.len());
        let mut probabilities = Vec::with_capacity(partitions.len());
        for p in &partitions {
            let mut belief = 1.0;
            let mut row = Vec::with_capacity(p.len());
            for segment in p.segments() {
                let prob = if segment.literal {
                    None
                } else {
                    model.prob(segment.character, &segment.reading)
                };
                if let Some(prob) = prob {
                    belief *= prob;
                }
                row.push(prob);
            }
            beliefs.push(belief);
            probabilities.push(row);
        }
        self.score(partitions, beliefs, Some(probabilities))
    }

    /// Scores this case with the length prior only.
    pub fn evaluate_baseline(&self) -> Evaluation {
        let partitions = partition(&self.word, &self.reading);
        let beliefs = omega_heuristics(&partitions);
        self.score(partitions, beliefs, None)
    }

    fn score(
        &self,
        partitions: Vec<Partition>,
        mut beliefs: Vec<f64>,
        probabilities: Option<Vec<Vec<Option<f64>>>>,
    ) -> Evaluation {
        rescale_to_ceiling(&mut beliefs);
        let heuristics = omega_heuristics(&partitions);

        // Stable sort: remaining ties keep partition order.
        let mut ranking: Vec<usize> = (0..partitions.len()).collect();
        ranking.sort_by(|&a, &b| {
            beliefs[b]
                .total_cmp(&beliefs[a])
                .then_with(|| heuristics[b].total_cmp(&heuristics[a]))
        });

        let best = ranking.first().copied();
        let confidence = match ranking.as_slice() {
            [] => 0.0,
            [_] => WEIGHT_CEILING,
            [first, second, ..] => beliefs[*first] - beliefs[*second],
        };
        let correct = best
            .map(|i| self.matches(&partitions[i]))
            .unwrap_or(false);

        Evaluation {
            word: self.word.clone(),
            reading: self.reading.clone(),
            partitions,
            beliefs,
            probabilities,
            best,
            confidence,
            correct,
        }
    }

    fn matches(&self, partition: &Partition) -> bool {
        partition.len() == self.expected.len()
            && partition
                .segments()
                .iter()
                .zip(&self.expected)
                .all(|(segment, expected)| segment.reading == *expected)
    }
}

/// Parses a test set, one [`TestCase`] per non-blank line.
pub fn parse_test_cases(text: &str) -> Result<Vec<TestCase>, YomiError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| TestCase::parse(index + 1, line))
        .collect()
}

/// Result of scoring one test case.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub word: String,
    pub reading: String,
    pub partitions: Vec<Partition>,
    /// Belief per partition, rescaled so the best is the weight ceiling.
    pub beliefs: Vec<f64>,
    /// Model probability per segment (`None` for literal or unknown characters);
    /// absent for baseline evaluations.
    pub probabilities: Option<Vec<Vec<Option<f64>>>>,
    pub best: Option<usize>,
    pub confidence: f64,
    pub correct: bool,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.correct { "CORRECT" } else { "WRONG" };
        writeln!(f, "<{}> --- ({} {}) ---", verdict, self.word, self.reading)?;
        for (i, partition) in self.partitions.iter().enumerate() {
            let marker = if self.best == Some(i) { '>' } else { ' ' };
            write!(f, " {}[{:>6}]", marker, format!("{:.1}", self.beliefs[i]))?;
            for (j, segment) in partition.segments().iter().enumerate() {
                write!(f, " {}", segment)?;
                if let Some(rows) = &self.probabilities {
                    match rows[i][j] {
                        Some(p) => write!(f, "({:.1})", p * 100.0)?,
                        None => f.write_str("(-)")?,
                    }
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "Confidence = {:.3}", self.confidence)
    }
}

/// Aggregate accuracy and confidence over a test set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TestStatistics {
    pub cases: usize,
    pub correct: usize,
    /// Sum of confidences of correct cases minus three times those of wrong ones.
    pub confidence: f64,
}

impl TestStatistics {
    pub fn from_evaluations(evaluations: &[Evaluation]) -> Self {
        let mut stats = Self::default();
        for evaluation in evaluations {
            stats.cases += 1;
            if evaluation.correct {
                stats.correct += 1;
                stats.confidence += evaluation.confidence;
            } else {
                stats.confidence -= evaluation.confidence * WRONG_CONFIDENCE_PENALTY;
            }
        }
        stats
    }

    /// Percentage of correct cases (0 for an empty set).
    pub fn accuracy(&self) -> f64 {
        if self.cases == 0 {
            0.0
        } else {
            self.correct as f64 / self.cases as f64 * 100.0
        }
    }
}

impl fmt::Display for TestStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Correct: {}/{} ({:.1}%)",
            self.correct,
            self.cases,
            self.accuracy()
        )
    }
}

/// Scores every case against `model`.
pub fn evaluate_model(cases: &[TestCase], model: &Model) -> Vec<Evaluation> {
    cases.iter().map(|case| case.evaluate(model)).collect()
}

/// Scores every case with the length prior only.
pub fn evaluate_baseline(cases: &[TestCase]) -> Vec<Evaluation> {
    cases.iter().map(TestCase::evaluate_baseline).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Tuple;
    use crate::engine::inference::FirstInQueue;
    use crate::engine::learner::{train, LearnerConfig};

    #[test]
    fn parse_splits_annotations_per_character() {
        let case = TestCase::parse(1, "お茶 お,ちゃ").expect("parse");
        assert_eq!(case.reading, "おちゃ");
        assert_eq!(case.expected, vec![Reading::from("お"), Reading::from("ちゃ")]);
    }

    #[test]
    fn parse_rejects_count_mismatch() {
        assert!(matches!(
            TestCase::parse(4, "火山 かざん"),
            Err(YomiError::Corpus { line: 4, .. })
        ));
        assert!(parse_test_cases("火山 か,ざん\n\n大人\n").is_err());
    }

    #[test]
    fn baseline_prefers_short_readings() {
        // 大:おと 人:な vs 大:お 人:とな tie on length; partition order decides.
        let case = TestCase::parse(1, "大人 お,とな").expect("parse");
        let evaluation = case.evaluate_baseline();
        assert_eq!(evaluation.best, Some(0));
        assert!(evaluation.correct);
        assert_eq!(evaluation.confidence, 0.0);
        assert!(evaluation.probabilities.is_none());
    }

    #[test]
    fn single_partition_has_full_confidence() {
        let case = TestCase::parse(1, "火山 か,ざん").expect("parse");
        let evaluation = case.evaluate_baseline();
        assert!(evaluation.correct);
        assert_eq!(evaluation.confidence, WEIGHT_CEILING);
    }

    #[test]
    fn unsegmentable_case_is_wrong_with_zero_confidence() {
        let case = TestCase::parse(1, "火山 ん,か").expect("parse");
        let evaluation = case.evaluate_baseline();
        assert!(evaluation.partitions.is_empty());
        assert!(!evaluation.correct);
        assert_eq!(evaluation.confidence, 0.0);
    }

    #[test]
    fn model_beliefs_pick_learned_reading() {
        let corpus = vec![
            Tuple::new("大人", "おとな"),
            Tuple::new("大", "おお"),
            Tuple::new("人", "な"),
        ];
        let (model, _) = train(&corpus, LearnerConfig::default(), &mut FirstInQueue).expect("train");
        let case = TestCase::parse(1, "大人 おと,な").expect("parse");
        let evaluation = case.evaluate(&model);
        assert_eq!(evaluation.best, Some(1));
        assert!(evaluation.correct);
        assert!(evaluation.confidence > 0.0);
        assert!(evaluation.to_string().starts_with("<CORRECT> --- (大人 おとな) ---\n"));
    }

    #[test]
    fn statistics_penalize_wrong_confidence() {
        let case = TestCase::parse(1, "火山 か,ざん").expect("parse");
        let right = case.evaluate_baseline();
        let mut wrong = right.clone();
        wrong.correct = false;
        wrong.confidence = 1.0;
        let stats = TestStatistics::from_evaluations(&[right, wrong]);
        assert_eq!(stats.cases, 2);
        assert_eq!(stats.correct, 1);
        assert!((stats.confidence - (10.0 - 3.0)).abs() < 1e-12);
        assert_eq!(stats.accuracy(), 50.0);
        assert_eq!(stats.to_string(), "Correct: 1/2 (50.0%)");
    }
}
