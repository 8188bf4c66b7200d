use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity text (lower-cased) to triage priority. Used both for the
/// training-time `recommended_priority` column and for predictions.
pub const SEVERITY_PRIORITY: &[(&str, u8)] =
    &[("critical", 1), ("high", 1), ("medium", 2), ("low", 3)];

/// Priority for any severity not listed in [`SEVERITY_PRIORITY`]
pub const DEFAULT_PRIORITY: u8 = 3;

/// Triage rank; 1 is the most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    /// Derive the priority from a severity label, case-insensitively
    pub fn from_severity(severity: &str) -> Self {
        let key = severity.trim().to_lowercase();
        let rank = SEVERITY_PRIORITY
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, rank)| *rank)
            .unwrap_or(DEFAULT_PRIORITY);
        Priority(rank)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Suggested handling for this rank
    pub fn recommended_action(&self) -> &'static str {
        match self.0 {
            1 => "Immediate barangay intervention",
            2 => "Schedule inspection within 24 hours",
            _ => "Monitor situation",
        }
    }

    pub fn is_urgent(&self) -> bool {
        self.0 == 1
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_from_severity() {
        assert_eq!(Priority::from_severity("Critical").value(), 1);
        assert_eq!(Priority::from_severity("High").value(), 1);
        assert_eq!(Priority::from_severity("Medium").value(), 2);
        assert_eq!(Priority::from_severity("Low").value(), 3);
        assert_eq!(Priority::from_severity("Unknown").value(), 3);
        assert_eq!(Priority::from_severity("").value(), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_priority_is_case_insensitive() {
        assert_eq!(Priority::from_severity("  hIgH "), Priority::from_severity("High"));
        assert_eq!(Priority::from_severity("MEDIUM").value(), 2);
    }

    #[test]
    fn test_recommended_action() {
        assert!(Priority::from_severity("critical").is_urgent());
        assert_eq!(
            Priority::from_severity("low").recommended_action(),
            "Monitor situation"
        );
        assert_eq!(
            Priority::from_severity("medium").recommended_action(),
            "Schedule inspection within 24 hours"
        );
    }
}
