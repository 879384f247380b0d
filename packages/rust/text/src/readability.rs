//! Flesch reading-ease scoring.

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use reglens_shared::{RegLensError, Result};

/// Difficulty bands as inclusive integer score ranges.
const BANDS: &[(f64, f64, &str)] = &[
    (90.0, 100.0, "Very Easy"),
    (80.0, 89.0, "Easy"),
    (70.0, 79.0, "Fairly Easy"),
    (60.0, 69.0, "Standard"),
    (50.0, 59.0, "Fairly Difficult"),
    (30.0, 49.0, "Difficult"),
    (0.0, 29.0, "Very Confusing"),
];

/// Reading-ease score with its difficulty label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadabilityReport {
    /// Flesch reading ease, rounded to two decimals.
    pub score: f64,
    /// Band label, `None` when the score falls outside every band.
    pub difficulty: Option<&'static str>,
    pub sentences: usize,
    pub words: usize,
    pub syllables: usize,
}

/// Score `text` with the Flesch reading-ease formula.
pub fn flesch_reading_ease(text: &str) -> Result<ReadabilityReport> {
    let words: Vec<&str> = text.unicode_words().collect();
    if words.is_empty() {
        return Err(RegLensError::validation("text contains no words"));
    }

    let sentences = text
        .unicode_sentences()
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count()
        .max(1);
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let words_per_sentence = words.len() as f64 / sentences as f64;
    let syllables_per_word = syllables as f64 / words.len() as f64;
    let raw = 206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word;
    let score = (raw * 100.0).round() / 100.0;

    Ok(ReadabilityReport {
        score,
        difficulty: difficulty_for(score),
        sentences,
        words: words.len(),
        syllables,
    })
}

/// Label for a score, if it lands inside one of the bands.
pub fn difficulty_for(score: f64) -> Option<&'static str> {
    BANDS
        .iter()
        .find(|(lo, hi, _)| score >= *lo && score <= *hi)
        .map(|(_, _, label)| *label)
}

/// Vowel-group syllable estimate with a silent-`e` adjustment.
fn count_syllables(word: &str) -> usize {
    let lower: Vec<char> = word.to_lowercase().chars().filter(|c| c.is_alphabetic()).collect();
    if lower.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut prev_vowel = false;
    for &c in &lower {
        let vowel = is_vowel(c);
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }

    let n = lower.len();
    if count > 1 && lower[n - 1] == 'e' && !(n >= 2 && lower[n - 2] == 'l') {
        count -= 1;
    }

    count.max(1)
}
