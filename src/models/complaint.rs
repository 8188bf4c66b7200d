use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A citizen complaint as loaded from the dataset
///
/// Only `complaint_text`, `category` and `severity` are interpreted by the
/// pipeline. Every other column is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    /// Free-text complaint body
    pub complaint_text: String,

    /// Raw category label, `None` when the cell is empty
    pub category: Option<String>,

    /// Raw severity label, `None` when the cell is empty
    pub severity: Option<String>,

    /// Passthrough columns (id, name, timestamp, location, priority, ...)
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ComplaintRecord {
    pub fn new(complaint_text: impl Into<String>) -> Self {
        Self {
            complaint_text: complaint_text.into(),
            category: None,
            severity: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Passthrough column value
    pub fn field(&self, name: &str) -> Option<&str> {
        self.extra.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = ComplaintRecord::new("Brownout po sa buong street.")
            .with_category("Utilities")
            .with_severity("High")
            .with_field("location", "Brgy 12");

        assert_eq!(record.category.as_deref(), Some("Utilities"));
        assert_eq!(record.severity.as_deref(), Some("High"));
        assert_eq!(record.field("location"), Some("Brgy 12"));
        assert_eq!(record.field("name"), None);
    }
}
