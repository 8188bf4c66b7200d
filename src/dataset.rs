//! Complaint dataset loading and preparation.
//!
//! Loading reads a CSV with at least `complaint_text`, `category` and
//! `severity` columns. Preparation fills missing labels, collapses rare
//! categories, encodes both label columns and derives the per-row
//! `recommended_priority` and keyword flags. No row is ever dropped.

use crate::error::{AppError, Result};
use crate::ml::features::{HandcraftedFeatures, KEYWORD_GROUPS};
use crate::ml::labels::{
    collapse_rare_labels, label_counts, LabelEncoder, LabelMappings, UNKNOWN_LABEL,
};
use crate::models::{ComplaintRecord, Priority};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const TEXT_COLUMN: &str = "complaint_text";
pub const CATEGORY_COLUMN: &str = "category";
pub const SEVERITY_COLUMN: &str = "severity";

/// Load complaint records from a CSV file
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ComplaintRecord>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| AppError::Dataset(format!("cannot open {}: {}", path.display(), e)))?;
    let records = read_records(file)?;

    tracing::info!(path = %path.display(), rows = records.len(), "Loaded complaint dataset");
    Ok(records)
}

/// Parse complaint records from CSV text with a header row
pub fn read_records<R: Read>(reader: R) -> Result<Vec<ComplaintRecord>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = reader.headers()?.clone();

    let columns = [TEXT_COLUMN, CATEGORY_COLUMN, SEVERITY_COLUMN]
        .map(|name| (name, headers.iter().position(|h| h.trim() == name)));

    let [text_idx, category_idx, severity_idx] = match columns.map(|(_, idx)| idx) {
        [Some(t), Some(c), Some(s)] => [t, c, s],
        _ => {
            let missing: Vec<&str> = columns
                .iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| *name)
                .collect();
            return Err(AppError::Dataset(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = ComplaintRecord::new(row.get(text_idx).unwrap_or_default());
        record.category = non_empty(row.get(category_idx));
        record.severity = non_empty(row.get(severity_idx));

        for (idx, (header, value)) in headers.iter().zip(row.iter()).enumerate() {
            if idx != text_idx && idx != category_idx && idx != severity_idx {
                record.extra.insert(header.trim().to_string(), value.to_string());
            }
        }
        records.push(record);
    }
    Ok(records)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Label and keyword counts of a prepared dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    pub category: BTreeMap<String, usize>,
    pub severity: BTreeMap<String, usize>,
    pub recommended_priority: BTreeMap<u8, usize>,

    /// Rows with each keyword group present
    pub keyword_hits: BTreeMap<String, usize>,
}

/// Cleaned, encoded dataset ready for splitting
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    /// Original text of every row
    pub texts: Vec<String>,

    /// Category per row after "Unknown" fill and rare-label collapse
    pub categories: Vec<String>,

    /// Severity per row after "Unknown" fill
    pub severities: Vec<String>,

    pub category_codes: Vec<usize>,
    pub severity_codes: Vec<usize>,

    /// Training-time convenience label; not a classifier target
    pub recommended_priority: Vec<Priority>,

    pub handcrafted: Vec<HandcraftedFeatures>,

    /// Passthrough columns, untouched
    pub extra: Vec<BTreeMap<String, String>>,

    pub mappings: LabelMappings,

    /// Raw categories rewritten to "Other"
    pub collapsed_categories: Vec<String>,
}

impl PreparedDataset {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn distribution(&self) -> ClassDistribution {
        let mut recommended_priority = BTreeMap::new();
        for priority in &self.recommended_priority {
            *recommended_priority.entry(priority.value()).or_insert(0) += 1;
        }

        let keyword_hits = KEYWORD_GROUPS
            .iter()
            .enumerate()
            .map(|(idx, group)| {
                let hits = self
                    .handcrafted
                    .iter()
                    .filter(|features| features.keyword_flags[idx])
                    .count();
                (group.name.to_string(), hits)
            })
            .collect();

        ClassDistribution {
            category: label_counts(&self.categories),
            severity: label_counts(&self.severities),
            recommended_priority,
            keyword_hits,
        }
    }
}

/// Clean and encode raw records
pub fn prepare(
    records: &[ComplaintRecord],
    min_category_support: usize,
) -> Result<PreparedDataset> {
    if records.is_empty() {
        return Err(AppError::Dataset("dataset has no rows".to_string()));
    }

    let fill = |label: &Option<String>| {
        label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(UNKNOWN_LABEL)
            .to_string()
    };

    let mut categories: Vec<String> = records.iter().map(|r| fill(&r.category)).collect();
    let severities: Vec<String> = records.iter().map(|r| fill(&r.severity)).collect();

    let collapsed_categories = collapse_rare_labels(&mut categories, min_category_support);
    if !collapsed_categories.is_empty() {
        tracing::info!(
            collapsed = ?collapsed_categories,
            min_support = min_category_support,
            "Collapsed rare categories into Other"
        );
    }

    let mappings = LabelMappings {
        category: LabelEncoder::fit(&categories),
        severity: LabelEncoder::fit(&severities),
    };
    let category_codes = mappings.category.encode_all(&categories)?;
    let severity_codes = mappings.severity.encode_all(&severities)?;

    let recommended_priority = severities.iter().map(|s| Priority::from_severity(s)).collect();
    let handcrafted = records
        .iter()
        .map(|r| HandcraftedFeatures::extract(&r.complaint_text))
        .collect();

    Ok(PreparedDataset {
        texts: records.iter().map(|r| r.complaint_text.clone()).collect(),
        categories,
        severities,
        category_codes,
        severity_codes,
        recommended_priority,
        handcrafted,
        extra: records.iter().map(|r| r.extra.clone()).collect(),
        mappings,
        collapsed_categories,
    })
}
