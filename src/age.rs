//! Age-up heuristic
//!
//! Guesses birth years in extracted page text and maps each of them to a
//! target year.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::patch::ReplacementMap;

/// Which years count as birth years and what they become
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeUpPolicy {
    pub min_year: u32,
    pub max_year: u32,
    pub target_year: u32,
}

impl Default for AgeUpPolicy {
    fn default() -> Self {
        Self {
            min_year: 2003,
            max_year: 2008,
            target_year: 2003,
        }
    }
}

impl AgeUpPolicy {
    pub fn in_range(&self, year: u32) -> bool {
        (self.min_year..=self.max_year).contains(&year)
    }
}

static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("hardcoded pattern cannot fail"));

/// Standalone four-digit years inside the policy range, in text order
pub fn find_candidate_years(text: &str, policy: &AgeUpPolicy) -> Vec<String> {
    YEAR_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|year| year.parse::<u32>().map_or(false, |y| policy.in_range(y)))
        .map(str::to_string)
        .collect()
}

/// Map each distinct candidate year (other than the target) to the target year
pub fn generate_age_replacements(text: &str, policy: &AgeUpPolicy) -> ReplacementMap {
    let target = policy.target_year.to_string();
    let mut replacements = ReplacementMap::new();
    for year in find_candidate_years(text, policy) {
        if year != target && !replacements.contains_key(&year) {
            replacements.insert(year, target.clone());
        }
    }
    tracing::debug!(count = replacements.len(), "Generated age-up replacements");
    replacements
}
