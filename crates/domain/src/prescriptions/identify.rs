//! Medication mention detection.
//!
//! Candidates come from two passes over the normalized text: known active
//! ingredients followed by a dose, and any capitalized one- or two-word name
//! followed by a dose. Both pools are merged and partial captures are folded
//! into the fuller ones that contain them.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::vocabulary::Vocabulary;

/// Integer or decimal dose followed by its unit.
pub(crate) const DOSE_AND_UNIT: &str =
    r"\d+(?:[.,]\d+)?\s?(?:(?:g/ml|g|mg|mcg|ml|ui)\b|%)";

const NAME_WORD: &str = r"[a-zà-öø-ÿ\-]+";

/// Capitalized words that precede doses in posology lines but are not drugs.
/// Matched as prefixes of the first word, like a negative lookahead.
const BLACKLIST: &[&str] = &[
    "aplicar", "tomar", "usar", "dias", "iniciar", "término", "após", "mar", "das",
];

// A capitalized word, optionally one more word on the same line, then a dose.
static FALLBACK: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"\b(?-i:[A-ZÀ-ÖØ-Þ]){NAME_WORD}(?:[^\S\n]+{NAME_WORD})?\s+{DOSE_AND_UNIT}"
    );
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .expect("fallback medication pattern must compile")
});

#[derive(Debug)]
struct Candidate {
    start: usize,
    text: String,
}

/// Finds the medications mentioned in `text`, title-cased, in order of first
/// appearance.
pub fn find_medications(text: &str, vocabulary: &Vocabulary) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Some(matcher) = vocabulary.matcher() {
        candidates.extend(matcher.find_iter(text).map(|m| Candidate {
            start: m.start(),
            text: m.as_str().to_string(),
        }));
    }
    candidates.extend(fallback_candidates(text));

    let mut survivors = remove_contained(dedup_exact(candidates));
    survivors.sort_by_key(|c| c.start);

    let mut names: Vec<String> = Vec::with_capacity(survivors.len());
    for candidate in survivors {
        let name = title_case(&collapse_whitespace(&candidate.text));
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn fallback_candidates(text: &str) -> Vec<Candidate> {
    let mut found = Vec::new();
    let mut position = 0;

    while position <= text.len() {
        let Some(m) = FALLBACK.find_at(text, position) else {
            break;
        };
        if is_blacklisted(m.as_str()) {
            // Retry from the next character, as a failed lookahead would.
            position = m.start() + m.as_str().chars().next().map_or(1, char::len_utf8);
            continue;
        }
        found.push(Candidate {
            start: m.start(),
            text: m.as_str().to_string(),
        });
        position = m.end();
    }
    found
}

fn is_blacklisted(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    BLACKLIST.iter().any(|word| lower.starts_with(word))
}

fn dedup_exact(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut unique: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let text = candidate.text.trim().to_string();
        match unique.iter_mut().find(|c| c.text == text) {
            Some(existing) => existing.start = existing.start.min(candidate.start),
            None => unique.push(Candidate {
                start: candidate.start,
                text,
            }),
        }
    }
    unique
}

/// Drops every candidate that is a strict substring of another one.
/// Pairwise, O(n²) over the handful of candidates a prescription produces.
fn remove_contained(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let contained: Vec<bool> = candidates
        .iter()
        .map(|a| {
            candidates
                .iter()
                .any(|b| a.text != b.text && b.text.contains(a.text.as_str()))
        })
        .collect();

    candidates
        .into_iter()
        .zip(contained)
        .filter_map(|(candidate, contained)| (!contained).then_some(candidate))
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-cases every letter that follows a non-letter and lower-cases the
/// rest, so "500mg" becomes "500Mg".
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;

    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}
