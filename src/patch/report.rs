//! Replacement request and report types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Old token → new token, applied in insertion order
pub type ReplacementMap = IndexMap<String, String>;

/// Outcome for one old token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementDetail {
    pub new_value: String,
    pub count: u64,
    pub found: bool,
}

impl ReplacementDetail {
    fn new(new_value: &str) -> Self {
        Self {
            new_value: new_value.to_string(),
            count: 0,
            found: false,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementReport {
    pub total_replacements: u64,
    pub replacement_details: IndexMap<String, ReplacementDetail>,
}

impl ReplacementReport {
    /// A report with one zeroed entry per key, in map order
    pub fn for_map(replacements: &ReplacementMap) -> Self {
        Self {
            total_replacements: 0,
            replacement_details: replacements
                .iter()
                .map(|(old, new)| (old.clone(), ReplacementDetail::new(new)))
                .collect(),
        }
    }

    /// Add `count` occurrences of `old` to the report
    pub fn record(&mut self, old: &str, count: u64) {
        if count == 0 {
            return;
        }
        if let Some(detail) = self.replacement_details.get_mut(old) {
            detail.count += count;
            detail.found = true;
            self.total_replacements += count;
        }
    }

    /// Whether anything was replaced
    pub fn is_empty(&self) -> bool {
        self.total_replacements == 0
    }
}
