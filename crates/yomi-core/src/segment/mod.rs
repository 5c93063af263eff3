//! # Segmentation
//!
//! Enumerates every legal alignment of a reading string to the characters of a word.
//!
//! The search walks the word left to right:
//! - a phonetic character consumes exactly one identical character of the reading
//!   (a *literal* segment), otherwise the branch dies;
//! - the last character consumes the whole remaining tail, if that tail is legal;
//! - any other character tries every legal prefix that leaves at least one unit of
//!   reading for each character still to place.
//!
//! No weighting happens here. [`omega_heuristics`] provides the length-based prior
//! used by the baseline evaluator.

pub mod kana;

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::engine::distribution::{rescale_to_ceiling, Reading};

pub use kana::{is_legal_reading, is_phonetic, reading_prior_weight, syllable_length};

/// Inline capacity for partition segments; most words have four characters or fewer.
const INLINE_SEGMENTS: usize = 4;

/// One character of a word paired with the reading substring assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Segment {
    pub character: char,
    pub reading: Reading,
    /// True when the character is phonetic and was matched literally.
    pub literal: bool,
}

impl Segment {
    fn assigned(character: char, reading: &[char]) -> Self {
        Self {
            character,
            reading: Arc::from(reading.iter().collect::<String>()),
            literal: false,
        }
    }

    fn literal(character: char) -> Self {
        Self {
            character,
            reading: Arc::from(character.to_string()),
            literal: true,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.character, self.reading)
    }
}

/// A complete alignment of a word to its reading, one segment per character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Partition {
    segments: SmallVec<[Segment; INLINE_SEGMENTS]>,
}

impl Partition {
    /// Builds a partition from explicit `(character, reading)` pairs.
    ///
    /// Phonetic characters whose reading is themselves are marked literal.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (char, &'a str)>,
    {
        let segments = pairs
            .into_iter()
            .map(|(character, reading)| {
                let literal =
                    is_phonetic(character) && reading.chars().eq(std::iter::once(character));
                Segment {
                    character,
                    reading: Arc::from(reading),
                    literal,
                }
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments whose reading has to be inferred (non-literal).
    pub fn inferred(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.segments.iter().filter(|s| !s.literal)
    }

    /// Readings assigned to `character`, in word order.
    pub fn readings_for(&self, character: char) -> impl Iterator<Item = &Reading> + '_ {
        self.segments
            .iter()
            .filter(move |s| !s.literal && s.character == character)
            .map(|s| &s.reading)
    }

    /// Concatenation of the segment characters.
    pub fn word(&self) -> String {
        self.segments.iter().map(|s| s.character).collect()
    }

    /// Concatenation of the segment readings.
    pub fn reading(&self) -> String {
        self.segments.iter().map(|s| &*s.reading).collect()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Enumerates every legal partition of `reading` among the characters of `word`.
///
/// Returns an empty vector when no legal alignment exists (including an empty word);
/// this is a valid result, not an error.
pub fn partition(word: &str, reading: &str) -> Vec<Partition> {
    let word: Vec<char> = word.chars().collect();
    let reading: Vec<char> = reading.chars().collect();
    let mut partitions = Vec::new();
    if word.is_empty() {
        return partitions;
    }

    let mut partial = SmallVec::new();
    search(&word, &reading, &mut partial, &mut partitions);
    partitions
}

fn search(
    word: &[char],
    reading: &[char],
    partial: &mut SmallVec<[Segment; INLINE_SEGMENTS]>,
    out: &mut Vec<Partition>,
) {
    let Some((&head, rest)) = word.split_first() else {
        if reading.is_empty() {
            out.push(Partition {
                segments: partial.clone(),
            });
        }
        return;
    };

    if is_phonetic(head) {
        if reading.first() == Some(&head) {
            partial.push(Segment::literal(head));
            search(rest, &reading[1..], partial, out);
            partial.pop();
        }
        return;
    }

    if rest.is_empty() {
        if kana::starts_legally(reading.first().copied()) {
            partial.push(Segment::assigned(head, reading));
            out.push(Partition {
                segments: partial.clone(),
            });
            partial.pop();
        }
        return;
    }

    let longest = reading.len().saturating_sub(rest.len());
    for len in 1..=longest {
        let (prefix, tail) = reading.split_at(len);
        if !kana::starts_legally(prefix.first().copied()) {
            continue;
        }
        partial.push(Segment::assigned(head, prefix));
        search(rest, tail, partial, out);
        partial.pop();
    }
}

/// Length-prior score of each partition, rescaled so the best equals the weight ceiling.
///
/// A partition scores the sum of [`reading_prior_weight`] over its inferred segments.
pub fn omega_heuristics(partitions: &[Partition]) -> Vec<f64> {
    let mut scores: Vec<f64> = partitions
        .iter()
        .map(|p| p.inferred().map(|s| reading_prior_weight(&s.reading)).sum())
        .collect();
    rescale_to_ceiling(&mut scores);
    scores
}
