//! Corpus tuples: parsing, cleanup and test-set sampling.
//!
//! Everything here works on in-memory text; reading and writing files is the
//! caller's job.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::engine::errors::YomiError;

/// Iteration mark; words using it repeat the previous character's reading.
const ITERATION_MARK: char = '々';

/// One training example: a word and its full reading.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Tuple {
    pub word: String,
    pub reading: String,
}

impl Tuple {
    pub fn new(word: impl Into<String>, reading: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            reading: reading.into(),
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.word, self.reading)
    }
}

/// Parses one `word reading` tuple per line. Blank lines are skipped.
pub fn parse_tuples(text: &str) -> Result<Vec<Tuple>, YomiError> {
    let mut tuples = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [word, reading] => tuples.push(Tuple::new(*word, *reading)),
            _ => {
                return Err(YomiError::corpus(
                    index + 1,
                    format!("expected 2 tokens, found {}", tokens.len()),
                ))
            }
        }
    }
    Ok(tuples)
}

/// Renders tuples in the line format accepted by [`parse_tuples`].
pub fn format_tuples(tuples: &[Tuple]) -> String {
    let mut out = String::new();
    for tuple in tuples {
        out.push_str(&tuple.to_string());
        out.push('\n');
    }
    out
}

/// Strips the parts of a tuple that need no inference.
///
/// Words containing the iteration mark are dropped. Characters shared literally
/// at the start, then at the end, of word and reading are removed (okurigana and
/// kana prefixes). Returns `None` if nothing is left to infer.
pub fn clean_tuple(word: &str, reading: &str) -> Option<Tuple> {
    if word.contains(ITERATION_MARK) {
        return None;
    }
    let mut word: Vec<char> = word.chars().collect();
    let mut reading: Vec<char> = reading.chars().collect();

    let shared_prefix = word
        .iter()
        .zip(&reading)
        .take_while(|(w, r)| w == r)
        .count();
    word.drain(..shared_prefix);
    reading.drain(..shared_prefix);

    let shared_suffix = word
        .iter()
        .rev()
        .zip(reading.iter().rev())
        .take_while(|(w, r)| w == r)
        .count();
    word.truncate(word.len() - shared_suffix);
    reading.truncate(reading.len() - shared_suffix);

    if word.is_empty() {
        return None;
    }
    Some(Tuple::new(
        word.into_iter().collect::<String>(),
        reading.into_iter().collect::<String>(),
    ))
}

/// Applies [`clean_tuple`] to every tuple, dropping those with nothing left.
pub fn prepare_corpus(tuples: &[Tuple]) -> Vec<Tuple> {
    tuples
        .iter()
        .filter_map(|t| clean_tuple(&t.word, &t.reading))
        .collect()
}

/// Samples up to `size` distinct multi-character tuples as test-set candidates.
pub fn sample_test_candidates<R: Rng + ?Sized>(
    tuples: &[Tuple],
    size: usize,
    rng: &mut R,
) -> Vec<Tuple> {
    let pool: Vec<&Tuple> = tuples.iter().filter(|t| t.word.chars().count() > 1).collect();
    pool.choose_multiple(rng, size)
        .map(|t| (*t).clone())
        .collect()
}
