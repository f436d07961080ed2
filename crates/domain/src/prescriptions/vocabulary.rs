use std::{collections::BTreeSet, fs, path::Path};

use regex::{Regex, RegexBuilder};

use super::identify::DOSE_AND_UNIT;

/// Known active ingredients, lower-cased.
///
/// The matcher is compiled once here so identification does not rebuild it
/// for every prescription.
#[derive(Clone, Debug, Default)]
pub struct Vocabulary {
    entries: BTreeSet<String>,
    matcher: Option<Regex>,
}

impl Vocabulary {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: BTreeSet<String> = entries
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        let matcher = build_matcher(&entries);
        Self { entries, matcher }
    }

    /// Loads the first column of a CSV file. A missing or unreadable file
    /// yields an empty vocabulary.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => {
                let vocabulary = Self::parse_csv(&contents);
                tracing::info!(
                    "Loaded {} active ingredients from {}",
                    vocabulary.len(),
                    path.display()
                );
                vocabulary
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read active ingredients from {}: {}. \
                     Falling back to pattern matching only",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn parse_csv(contents: &str) -> Self {
        Self::new(contents.lines().filter_map(|line| {
            let first = line.split(',').next()?.trim().trim_matches('"');
            (!first.is_empty()).then_some(first)
        }))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(&entry.to_lowercase())
    }

    pub(crate) fn matcher(&self) -> Option<&Regex> {
        self.matcher.as_ref()
    }
}

// One alternation instead of one pattern per entry. Longer entries go first so
// an entry that ends another one ("ácido acetilsalicílico" vs
// "acetilsalicílico") is tried in its full form; the shorter capture would be
// dropped by containment de-duplication anyway.
fn build_matcher(entries: &BTreeSet<String>) -> Option<Regex> {
    if entries.is_empty() {
        return None;
    }

    let mut sorted: Vec<&String> = entries.iter().collect();
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

    let alternation = sorted
        .iter()
        .map(|e| regex::escape(e))
        .collect::<Vec<_>>()
        .join("|");

    let pattern = format!(r"(?:{alternation})\s+{DOSE_AND_UNIT}\b");
    match RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .size_limit(64 * (1 << 20))
        .build()
    {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!("Active ingredient matcher failed to compile: {}", e);
            None
        }
    }
}
