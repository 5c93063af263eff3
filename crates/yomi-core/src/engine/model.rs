//! # Model
//!
//! The owned aggregate that replaces global registries: a node arena keyed by
//! character, a factor arena keyed by `(word, reading)`, and the corpus order in
//! which factors are visited each trial.
//!
//! ## Lifecycle
//!
//! 1. [`Model::new`] creates an empty model from a validated [`LearnerConfig`].
//! 2. The first trial registers one factor per distinct tuple and creates nodes
//!    the first time a character is seen, unless the corpus was already
//!    registered with [`Model::register`].
//! 3. Later trials reset node distributions and reuse the same factors; partitions
//!    are never recomputed, omegas and alphas carry over as priors.

use rustc_hash::FxHashMap;

use crate::engine::errors::YomiError;
use crate::engine::factor::{Factor, FactorId};
use crate::engine::learner::LearnerConfig;
use crate::engine::node::{Node, NodeArena, NodeId};

/// Nodes, factors and learning state for one corpus.
#[derive(Debug, Clone)]
pub struct Model {
    config: LearnerConfig,
    nodes: NodeArena,
    factors: Vec<Factor>,
    factor_index: FxHashMap<(String, String), FactorId>,
    /// Factor visited at each corpus position.
    corpus_order: Vec<FactorId>,
    trials_completed: usize,
}

impl Model {
    pub fn new(config: LearnerConfig) -> Result<Self, YomiError> {
        Ok(Self {
            config: config.validate()?,
            nodes: NodeArena::new(),
            factors: Vec::new(),
            factor_index: FxHashMap::default(),
            corpus_order: Vec::new(),
            trials_completed: 0,
        })
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn trials_completed(&self) -> usize {
        self.trials_completed
    }

    pub(crate) fn finish_trial(&mut self) {
        self.trials_completed += 1;
    }

    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    /// Node for `character`, if it appeared in the corpus.
    pub fn node(&self, character: char) -> Option<&Node> {
        self.nodes.lookup(character)
    }

    /// Probability of `reading` for `character`, if the character has a node.
    pub fn prob(&self, character: char, reading: &str) -> Option<f64> {
        self.nodes.prob(character, reading)
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    pub fn factor(&self, id: FactorId) -> Option<&Factor> {
        self.factors.get(id.index())
    }

    pub fn factor_for(&self, word: &str, reading: &str) -> Option<&Factor> {
        self.factor_index
            .get(&(word.to_owned(), reading.to_owned()))
            .and_then(|id| self.factor(*id))
    }

    pub fn corpus_order(&self) -> &[FactorId] {
        &self.corpus_order
    }

    /// Registers one corpus tuple, appending it to the corpus order.
    ///
    /// Once tuples are registered, every trial checks its corpus against this
    /// order instead of registering again.
    ///
    /// The first occurrence of a tuple builds its factor; a repeated tuple reuses
    /// it. Characters seen for the first time get a node whose distribution is
    /// uniform over this factor's candidates for them.
    pub fn register(&mut self, word: &str, reading: &str) -> FactorId {
        let key = (word.to_owned(), reading.to_owned());
        let id = match self.factor_index.get(&key) {
            Some(id) => *id,
            None => {
                let id = FactorId(self.factors.len() as u32);
                let factor = Factor::new(id, word, reading);
                let smoothing = self.config.initial_smoothing;
                for &c in factor.characters() {
                    let node_id = self
                        .nodes
                        .get_or_insert_with(c, smoothing, || factor.candidate_readings(c));
                    if let Some(node) = self.nodes.get_mut(node_id) {
                        node.attach(id);
                    }
                }
                self.factors.push(factor);
                self.factor_index.insert(key, id);
                id
            }
        };
        self.corpus_order.push(id);
        id
    }

    /// Recomputes one node's distribution from its incident factors.
    ///
    /// Returns `true` when the distribution changed (neighbors may now be stale)
    /// and `false` when it is unchanged within tolerance.
    pub fn update_distribution(&mut self, id: NodeId) -> Result<bool, YomiError> {
        let node = self.node_by_id(id)?;
        let fresh = node.gather_messages(&self.factors, &self.nodes)?;
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| YomiError::Internal(format!("missing node {:?}", id)))?;
        Ok(node.accept(fresh))
    }

    /// Every node sharing at least one factor with `id`, excluding itself.
    pub fn neighbors(&self, id: NodeId) -> Result<Vec<NodeId>, YomiError> {
        let node = self.node_by_id(id)?;
        let mut adjacent = Vec::new();
        for factor_id in node.factors() {
            let factor = self.factor(*factor_id).ok_or_else(|| {
                YomiError::Internal(format!("missing factor {:?}", factor_id))
            })?;
            for &c in factor.characters() {
                if c == node.character() {
                    continue;
                }
                if let Some(other) = self.nodes.id_of(c) {
                    if !adjacent.contains(&other) {
                        adjacent.push(other);
                    }
                }
            }
        }
        Ok(adjacent)
    }

    /// Node ids of a factor's characters, in word order.
    pub(crate) fn factor_nodes(&self, id: FactorId) -> Result<Vec<NodeId>, YomiError> {
        let factor = self
            .factor(id)
            .ok_or_else(|| YomiError::Internal(format!("missing factor {:?}", id)))?;
        factor
            .characters()
            .iter()
            .map(|&c| {
                self.nodes.id_of(c).ok_or_else(|| {
                    YomiError::Internal(format!("character '{}' has no node", c))
                })
            })
            .collect()
    }

    /// Resets every node ahead of a new trial.
    pub fn reset_distributions(&mut self) {
        let threshold = self.config.reset_threshold;
        let smoothing = self.config.reset_smoothing;
        for node in self.nodes.iter_mut() {
            node.reset_distribution(threshold, smoothing);
        }
    }

    /// Recomputes omegas for every factor from current beliefs.
    pub fn update_omegas(&mut self) -> Result<(), YomiError> {
        let smoothing = self.config.omega_smoothing;
        for factor in &mut self.factors {
            factor.update_omegas(&self.nodes, smoothing)?;
        }
        Ok(())
    }

    /// Recomputes alphas for every node from the factors' best partitions.
    pub fn update_alphas(&mut self) -> Result<(), YomiError> {
        for node in self.nodes.iter_mut() {
            node.update_alphas(&self.factors)?;
        }
        Ok(())
    }

    fn node_by_id(&self, id: NodeId) -> Result<&Node, YomiError> {
        self.nodes
            .get(id)
            .ok_or_else(|| YomiError::Internal(format!("missing node {:?}", id)))
    }
}
