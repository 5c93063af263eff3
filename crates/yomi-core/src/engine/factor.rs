//! Factors: one constraint per training tuple.
//!
//! A [`Factor`] owns the partitions of its `(word, reading)` pair, computed once
//! at construction, and a positionally aligned vector of partition confidence
//! weights (omegas). It reads other characters' beliefs through the shared
//! [`NodeArena`] instead of holding node references.

use smallvec::SmallVec;

use crate::engine::distribution::{first_argmax, rescale_to_ceiling, Distribution, Reading};
use crate::engine::errors::YomiError;
use crate::engine::node::NodeArena;
use crate::segment::{self, is_phonetic, Partition};

/// A unique identifier for a factor in the model.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FactorId(pub u32);

impl FactorId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Constraint object for one training example.
#[derive(Debug, Clone)]
pub struct Factor {
    id: FactorId,
    word: String,
    reading: String,
    partitions: Vec<Partition>,
    /// Distinct non-phonetic characters of the word, in first-occurrence order.
    characters: SmallVec<[char; 4]>,
    /// Number of non-phonetic character positions (repeats counted).
    inferred_positions: usize,
    omegas: Vec<f64>,
    best: Option<usize>,
}

impl Factor {
    /// Builds the factor and enumerates its partitions.
    pub fn new(id: FactorId, word: &str, reading: &str) -> Self {
        let mut characters: SmallVec<[char; 4]> = SmallVec::new();
        let mut inferred_positions = 0;
        for c in word.chars().filter(|c| !is_phonetic(*c)) {
            inferred_positions += 1;
            if !characters.contains(&c) {
                characters.push(c);
            }
        }
        Self {
            id,
            word: word.to_owned(),
            reading: reading.to_owned(),
            partitions: segment::partition(word, reading),
            characters,
            inferred_positions,
            omegas: Vec::new(),
            best: None,
        }
    }

    pub fn id(&self) -> FactorId {
        self.id
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn reading(&self) -> &str {
        &self.reading
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Characters whose readings this factor constrains.
    pub fn characters(&self) -> &[char] {
        &self.characters
    }

    /// Partition confidence weights; empty until the first parameter update.
    pub fn omegas(&self) -> &[f64] {
        &self.omegas
    }

    pub fn best_index(&self) -> Option<usize> {
        self.best
    }

    pub fn best_partition(&self) -> Option<&Partition> {
        self.best.and_then(|i| self.partitions.get(i))
    }

    /// Every reading any partition assigns to `character`, in partition order.
    pub fn candidate_readings(&self, character: char) -> Vec<Reading> {
        let mut candidates: Vec<Reading> = Vec::new();
        for reading in self
            .partitions
            .iter()
            .flat_map(|p| p.readings_for(character))
        {
            if !candidates.contains(reading) {
                candidates.push(reading.clone());
            }
        }
        candidates
    }

    /// Outbound message to `character`'s node.
    ///
    /// With a single character to infer the message is uniform over its candidates.
    /// Otherwise each partition contributes the product of the other characters'
    /// current beliefs (times its omega, once known) to the reading it assigns to
    /// `character`; partitions agreeing on that reading add up.
    pub fn message_for(
        &self,
        character: char,
        nodes: &NodeArena,
    ) -> Result<Distribution, YomiError> {
        if self.inferred_positions == 1 {
            return Ok(Distribution::uniform(self.candidate_readings(character)));
        }

        let mut message = Distribution::new();
        for (p_index, partition) in self.partitions.iter().enumerate() {
            let segments = partition.segments();
            for (target, segment) in segments.iter().enumerate() {
                if segment.literal || segment.character != character {
                    continue;
                }
                let mut mass = 1.0;
                for (other, neighbor) in segments.iter().enumerate() {
                    if other == target || neighbor.literal {
                        continue;
                    }
                    mass *= self.belief(nodes, neighbor.character, &neighbor.reading)?;
                }
                if let Some(omega) = self.omegas.get(p_index) {
                    mass *= omega;
                }
                message.add(segment.reading.clone(), mass);
            }
        }
        Ok(message.normalized())
    }

    /// Re-weights every partition by how well current beliefs support it.
    ///
    /// `omega(p) = Π (prob(reading) + smoothing)` over the inferred segments of `p`,
    /// rescaled to the weight ceiling. The smoothing keeps runner-up partitions alive
    /// for the next trial. The best partition is the first one with the maximal omega.
    pub fn update_omegas(&mut self, nodes: &NodeArena, smoothing: f64) -> Result<(), YomiError> {
        let mut omegas = Vec::with_capacity(self.partitions.len());
        for partition in &self.partitions {
            let mut omega = 1.0;
            for segment in partition.inferred() {
                omega *= self.belief(nodes, segment.character, &segment.reading)? + smoothing;
            }
            omegas.push(omega);
        }
        rescale_to_ceiling(&mut omegas);
        self.best = first_argmax(&omegas);
        self.omegas = omegas;
        Ok(())
    }

    /// Readings the best partition assigns to `character` (several if it repeats).
    pub fn best_readings(&self, character: char) -> Vec<Reading> {
        self.best_partition()
            .map(|p| p.readings_for(character).cloned().collect())
            .unwrap_or_default()
    }

    fn belief(&self, nodes: &NodeArena, character: char, reading: &str) -> Result<f64, YomiError> {
        nodes.prob(character, reading).ok_or_else(|| {
            YomiError::Internal(format!(
                "factor ({} {}) references unknown character '{}'",
                self.word, self.reading, character
            ))
        })
    }
}
