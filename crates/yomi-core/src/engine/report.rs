//! Read-only snapshots of nodes and factors for result reporting.
//!
//! The `Display` impls render the human-readable line formats; writing them
//! anywhere is left to the caller.

use std::fmt;

use crate::engine::distribution::Reading;
use crate::engine::factor::Factor;
use crate::engine::model::Model;
use crate::engine::node::Node;
use crate::segment::Segment;

/// Alpha weight of one incident factor, identified by its tuple.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AlphaEntry {
    pub alpha: f64,
    pub word: String,
    pub reading: String,
}

/// Distribution and alphas of one node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeReport {
    pub character: char,
    /// `(probability, reading)`, most probable first.
    pub distribution: Vec<(f64, Reading)>,
    /// Sorted by descending alpha; empty before the first parameter update.
    pub alphas: Vec<AlphaEntry>,
}

impl NodeReport {
    pub fn from_node(node: &Node, model: &Model) -> Self {
        let mut alphas: Vec<AlphaEntry> = node
            .factors()
            .iter()
            .zip(node.alphas())
            .filter_map(|(id, &alpha)| {
                model.factor(*id).map(|factor| AlphaEntry {
                    alpha,
                    word: factor.word().to_owned(),
                    reading: factor.reading().to_owned(),
                })
            })
            .collect();
        alphas.sort_by(|a, b| {
            b.alpha
                .total_cmp(&a.alpha)
                .then_with(|| b.word.cmp(&a.word))
                .then_with(|| b.reading.cmp(&a.reading))
        });
        Self {
            character: node.character(),
            distribution: node.distribution().sorted(),
            alphas,
        }
    }

    /// The alpha line: `火: 10.0 (火 ひ) 5.0 (火山 かざん)`.
    pub fn alpha_line(&self) -> AlphaLine<'_> {
        AlphaLine(self)
    }
}

impl fmt::Display for NodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.character)?;
        for (p, reading) in &self.distribution {
            write!(f, " {}({:.1})", reading, p * 100.0)?;
        }
        Ok(())
    }
}

/// Display adapter for a node's alpha vector.
pub struct AlphaLine<'a>(&'a NodeReport);

impl fmt::Display for AlphaLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.0.character)?;
        for entry in &self.0.alphas {
            write!(f, " {:.1} ({} {})", entry.alpha, entry.word, entry.reading)?;
        }
        Ok(())
    }
}

/// One partition of a factor with its omega and best marker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PartitionReport {
    /// `None` until the first parameter update.
    pub omega: Option<f64>,
    pub best: bool,
    pub segments: Vec<Segment>,
}

/// All partitions of one factor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FactorReport {
    pub word: String,
    pub reading: String,
    pub partitions: Vec<PartitionReport>,
}

impl FactorReport {
    pub fn from_factor(factor: &Factor) -> Self {
        let partitions = factor
            .partitions()
            .iter()
            .enumerate()
            .map(|(i, partition)| PartitionReport {
                omega: factor.omegas().get(i).copied(),
                best: factor.best_index() == Some(i),
                segments: partition.segments().to_vec(),
            })
            .collect();
        Self {
            word: factor.word().to_owned(),
            reading: factor.reading().to_owned(),
            partitions,
        }
    }
}

impl fmt::Display for FactorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- ({} {}) ---", self.word, self.reading)?;
        for partition in &self.partitions {
            let omega = match partition.omega {
                Some(w) => format!("{:.1}", w),
                None => "-".to_string(),
            };
            let marker = if partition.best { '>' } else { ' ' };
            write!(f, " {}[{:>6}]", marker, omega)?;
            for segment in &partition.segments {
                write!(f, " {}", segment)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Model {
    /// Reports for every node, in creation order.
    pub fn node_reports(&self) -> Vec<NodeReport> {
        self.nodes()
            .iter()
            .map(|node| NodeReport::from_node(node, self))
            .collect()
    }

    /// Reports for every factor, in registration order.
    pub fn factor_reports(&self) -> Vec<FactorReport> {
        self.factors().iter().map(FactorReport::from_factor).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Tuple;
    use crate::engine::inference::FirstInQueue;
    use crate::engine::learner::LearnerConfig;

    #[test]
    fn factor_report_before_learning_has_no_omegas() {
        let mut model = Model::new(LearnerConfig::default()).expect("config");
        model.register("大人", "おとな");
        let report = &model.factor_reports()[0];
        assert_eq!(report.partitions.len(), 2);
        assert!(report.partitions.iter().all(|p| p.omega.is_none() && !p.best));
        assert_eq!(
            report.to_string(),
            "--- (大人 おとな) ---\n  [     -] 大:お 人:とな\n  [     -] 大:おと 人:な\n"
        );
    }

    #[test]
    fn reports_after_a_trial() {
        let data = vec![Tuple::new("火", "ひ"), Tuple::new("火山", "かざん")];
        let mut model = Model::new(LearnerConfig::default()).expect("config");
        model.run_trial(&data, &mut FirstInQueue).expect("trial");

        let factors = model.factor_reports();
        assert_eq!(
            factors[1].to_string(),
            "--- (火山 かざん) ---\n >[  10.0] 火:か 山:ざん\n"
        );

        let nodes = model.node_reports();
        let fire = nodes.iter().find(|n| n.character == '火').expect("node");
        assert_eq!(fire.alphas.len(), 2);
        assert!(fire.to_string().starts_with("火: "));
        // Both factors vote for different readings, so each gets 1/2 → rescaled to 10.
        assert_eq!(
            fire.alpha_line().to_string(),
            "火: 10.0 (火山 かざん) 10.0 (火 ひ)"
        );
    }
}
