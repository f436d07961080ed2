//! Total quantity from posology phrases such as
//! "1 comprimido, 3x ao dia, por 5 dias".

use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};

use super::model::NOT_IDENTIFIED;

const LEAD: &str = r"\s*[-–—:]*\s*";
const DOSE_FORM: &str = r"(\d+)\s*(comprimido|cápsula|gota)s?";

/// "<qty> <form>, <times>x ..., <days> dias"
static WITH_FREQUENCY: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(r"{LEAD}{DOSE_FORM}.*?(\d+)\s*x.*?(\d+)\s*dias"))
});

/// "<qty> <form> ... <days> dias"
static WITHOUT_FREQUENCY: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"{LEAD}{DOSE_FORM}.*?(\d+)\s*dias")));

fn compile(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("posology pattern must compile")
}

/// Computes the total quantity of `medication_name` from the text that
/// follows its first mention. Falls back to [`NOT_IDENTIFIED`].
pub fn resolve_quantity(medication_name: &str, full_text: &str) -> String {
    let Some(window) = window_after(medication_name, full_text) else {
        return NOT_IDENTIFIED.to_string();
    };

    if let Some(caps) = WITH_FREQUENCY.captures(window) {
        if let Some(total) = total(&caps, &[1, 3, 4]) {
            return format_total(total, &caps[2]);
        }
    } else if let Some(caps) = WITHOUT_FREQUENCY.captures(window) {
        if let Some(total) = total(&caps, &[1, 3]) {
            return format_total(total, &caps[2]);
        }
    }

    NOT_IDENTIFIED.to_string()
}

fn window_after<'t>(medication_name: &str, full_text: &'t str) -> Option<&'t str> {
    let words: Vec<String> = medication_name
        .split_whitespace()
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return None;
    }

    let pattern = RegexBuilder::new(&words.join(r"\s+"))
        .case_insensitive(true)
        .build()
        .ok()?;
    let found = pattern.find(full_text)?;
    Some(&full_text[found.end()..])
}

fn total(caps: &Captures, groups: &[usize]) -> Option<u64> {
    groups.iter().try_fold(1u64, |acc, &group| {
        let value: u64 = caps.get(group)?.as_str().parse().ok()?;
        acc.checked_mul(value)
    })
}

fn format_total(total: u64, form: &str) -> String {
    format!("{} {}s", total, form.to_lowercase())
}
