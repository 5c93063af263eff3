//! Classification of phonetic (hiragana) characters.

/// Kana that can never open a reading: small glides and the geminate/nasal markers.
const NON_INITIAL: [char; 5] = ['ゃ', 'ゅ', 'ょ', 'っ', 'ん'];

/// Small glides that merge into the preceding syllable.
const NON_OCCUPYING: [char; 3] = ['ゃ', 'ゅ', 'ょ'];

/// Returns true if `c` is a hiragana character (U+3041..=U+3094).
///
/// Phonetic characters inside a word must match the reading literally.
#[inline]
pub fn is_phonetic(c: char) -> bool {
    ('\u{3041}'..='\u{3094}').contains(&c)
}

/// Returns true if `c` can never be the first unit of a reading.
#[inline]
pub fn is_non_initial(c: char) -> bool {
    NON_INITIAL.contains(&c)
}

/// A reading is legal when it is non-empty and does not open with a non-initial kana.
pub fn is_legal_reading(reading: &str) -> bool {
    starts_legally(reading.chars().next())
}

#[inline]
pub(crate) fn starts_legally(first: Option<char>) -> bool {
    matches!(first, Some(c) if !is_non_initial(c))
}

/// Number of syllabic units in `reading`; small glides count as zero-width.
pub fn syllable_length(reading: &str) -> usize {
    reading
        .chars()
        .filter(|c| !NON_OCCUPYING.contains(c))
        .count()
}

/// Prior weight of a candidate reading for a single character.
///
/// Readings of one or two syllables get 1.0; longer readings decay as `3 / len²`
/// (3 → 0.33, 4 → 0.19, 5 → 0.12).
pub fn reading_prior_weight(reading: &str) -> f64 {
    let length = syllable_length(reading);
    if length <= 2 {
        1.0
    } else {
        3.0 / (length * length) as f64
    }
}
