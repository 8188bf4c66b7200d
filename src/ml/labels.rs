use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Categories seen fewer times than this are collapsed into [`OTHER_LABEL`]
pub const MIN_CATEGORY_SUPPORT: usize = 3;

/// Catch-all for rare categories
pub const OTHER_LABEL: &str = "Other";

/// Fill value for missing category/severity cells
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Result of decoding a predicted class code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DecodedLabel {
    /// Code found in the mapping
    Decoded(String),
    /// Code absent from the mapping; carried as-is
    RawCode(i64),
}

impl DecodedLabel {
    /// Label text, or the code's decimal form for unknown codes
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            DecodedLabel::Decoded(label) => Cow::Borrowed(label),
            DecodedLabel::RawCode(code) => Cow::Owned(code.to_string()),
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, DecodedLabel::Decoded(_))
    }
}

impl fmt::Display for DecodedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Dense integer codes for a closed set of text labels, assigned in sorted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Build the encoder from every observed label
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes: BTreeSet<&str> = labels.iter().map(AsRef::as_ref).collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(label))
            .ok()
    }

    /// Encode a column; every label must have been seen by [`LabelEncoder::fit`]
    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                self.encode(label).ok_or_else(|| {
                    AppError::Internal(format!("label '{}' is not in the encoder", label))
                })
            })
            .collect()
    }

    pub fn decode(&self, code: i64) -> DecodedLabel {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(|label| DecodedLabel::Decoded(label.clone()))
            .unwrap_or(DecodedLabel::RawCode(code))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// `{code -> label}` view
    pub fn mapping(&self) -> BTreeMap<usize, String> {
        self.classes.iter().cloned().enumerate().collect()
    }
}

/// Frozen label mappings of one trained bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMappings {
    pub category: LabelEncoder,
    pub severity: LabelEncoder,
}

/// Rewrite labels occurring fewer than `min_support` times to [`OTHER_LABEL`].
///
/// Returns the rewritten label names in sorted order.
pub fn collapse_rare_labels(labels: &mut [String], min_support: usize) -> Vec<String> {
    let counts = label_counts(labels);
    let rare: BTreeSet<String> = counts
        .into_iter()
        .filter(|(_, count)| *count < min_support)
        .map(|(label, _)| label)
        .collect();

    if rare.is_empty() {
        return Vec::new();
    }

    for label in labels.iter_mut() {
        if rare.contains(label.as_str()) {
            *label = OTHER_LABEL.to_string();
        }
    }
    rare.into_iter().collect()
}

/// Occurrences per label
pub fn label_counts<S: AsRef<str>>(labels: &[S]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(label.as_ref().to_string()).or_insert(0) += 1;
    }
    counts
}
