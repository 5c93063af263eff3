//! Character nodes: belief distributions over readings.
//!
//! A [`Node`] is shared by every factor that mentions its character. It never
//! holds factors directly; it keeps [`FactorId`]s into the model's factor arena
//! and a positionally aligned vector of reliability weights (alphas).

use rustc_hash::FxHashMap;

use crate::engine::distribution::{
    rescale_to_ceiling, Distribution, Reading, CONVERGENCE_TOLERANCE, WEIGHT_CEILING,
};
use crate::engine::errors::YomiError;
use crate::engine::factor::{Factor, FactorId};

/// A unique identifier for a node in the model.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Belief-holding variable for one character.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    character: char,
    distribution: Distribution,
    /// Incident factors in attachment order; alphas align to this order.
    factors: Vec<FactorId>,
    alphas: Vec<f64>,
    /// Probability returned for readings absent from the distribution.
    smoothing: f64,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        character: char,
        candidates: Vec<Reading>,
        smoothing: f64,
    ) -> Self {
        Self {
            id,
            character,
            distribution: Distribution::uniform(candidates),
            factors: Vec::new(),
            alphas: Vec::new(),
            smoothing,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn character(&self) -> char {
        self.character
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    pub fn factors(&self) -> &[FactorId] {
        &self.factors
    }

    /// Reliability weight per incident factor; empty until the first parameter update.
    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Probability of `reading`, or the smoothing floor if it is unknown.
    pub fn prob(&self, reading: &str) -> f64 {
        self.distribution.get(reading).unwrap_or(self.smoothing)
    }

    /// Links an incident factor. A factor is linked at most once.
    pub(crate) fn attach(&mut self, factor: FactorId) {
        if self.factors.contains(&factor) {
            return;
        }
        self.factors.push(factor);
        if !self.alphas.is_empty() {
            self.alphas.push(WEIGHT_CEILING);
        }
    }

    /// Sums the messages of every incident factor, weighted by alpha when available,
    /// and normalizes the result.
    pub fn gather_messages(
        &self,
        factors: &[Factor],
        nodes: &NodeArena,
    ) -> Result<Distribution, YomiError> {
        let mut fresh = Distribution::new();
        for (slot, factor_id) in self.factors.iter().enumerate() {
            let factor = factors.get(factor_id.index()).ok_or_else(|| {
                YomiError::Internal(format!(
                    "node '{}' references missing factor {:?}",
                    self.character, factor_id
                ))
            })?;
            let message = factor.message_for(self.character, nodes)?;
            let weight = self.alphas.get(slot).copied().unwrap_or(1.0);
            fresh.accumulate(&message, weight);
        }
        fresh.normalize();
        Ok(fresh)
    }

    /// Replaces the distribution if `fresh` differs; returns whether it changed.
    pub(crate) fn accept(&mut self, fresh: Distribution) -> bool {
        if self.distribution.approx_eq(&fresh, CONVERGENCE_TOLERANCE) {
            return false;
        }
        self.distribution = fresh;
        true
    }

    /// Recomputes alphas from the best partitions of the incident factors.
    ///
    /// Each factor votes for the reading(s) its best partition assigns to this
    /// character. A factor's alpha is `Σ 1 / (votes(reading) + 1)` over its own
    /// votes, so factors backing a rare reading weigh more than factors echoing
    /// the consensus. The vector is rescaled to the weight ceiling.
    pub fn update_alphas(&mut self, factors: &[Factor]) -> Result<(), YomiError> {
        let mut ballots: Vec<Vec<Reading>> = Vec::with_capacity(self.factors.len());
        let mut votes: FxHashMap<Reading, usize> = FxHashMap::default();
        for factor_id in &self.factors {
            let factor = factors.get(factor_id.index()).ok_or_else(|| {
                YomiError::Internal(format!(
                    "node '{}' references missing factor {:?}",
                    self.character, factor_id
                ))
            })?;
            let readings = factor.best_readings(self.character);
            for reading in &readings {
                *votes.entry(reading.clone()).or_insert(0) += 1;
            }
            ballots.push(readings);
        }

        let mut alphas: Vec<f64> = ballots
            .iter()
            .map(|readings| {
                readings
                    .iter()
                    .map(|r| 1.0 / (votes.get(r).copied().unwrap_or(0) + 1) as f64)
                    .sum()
            })
            .collect();
        rescale_to_ceiling(&mut alphas);
        self.alphas = alphas;
        Ok(())
    }

    /// Keeps readings above `threshold`, makes them uniform, and lowers the smoothing floor.
    pub fn reset_distribution(&mut self, threshold: f64, smoothing: f64) {
        let kept = self.distribution.readings_above(threshold);
        self.distribution = Distribution::uniform(kept);
        self.smoothing = smoothing;
    }
}

/// Arena of nodes addressed by [`NodeId`] or by character.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    index: FxHashMap<char, NodeId>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn id_of(&self, character: char) -> Option<NodeId> {
        self.index.get(&character).copied()
    }

    pub fn lookup(&self, character: char) -> Option<&Node> {
        self.id_of(character).and_then(|id| self.get(id))
    }

    /// Current probability of `reading` for `character`, if the character has a node.
    pub fn prob(&self, character: char, reading: &str) -> Option<f64> {
        self.lookup(character).map(|node| node.prob(reading))
    }

    /// Nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> + '_ {
        self.nodes.iter_mut()
    }

    /// Returns the node for `character`, creating it with `candidates` on first sight.
    pub(crate) fn get_or_insert_with<F>(
        &mut self,
        character: char,
        smoothing: f64,
        candidates: F,
    ) -> NodeId
    where
        F: FnOnce() -> Vec<Reading>,
    {
        if let Some(id) = self.id_of(character) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes
            .push(Node::new(id, character, candidates(), smoothing));
        self.index.insert(character, id);
        id
    }
}
