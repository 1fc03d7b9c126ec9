/// A human-verified name → ethnicity label.
///
/// Entries are append-only: correcting a label means recording a new entry
/// for the same name, and lookups resolve to the most recent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    pub name: String,
    pub ethnicity: String,
    /// Free-text context shown next to the label when used as a few-shot example.
    pub notes: Option<String>,
}

impl FeedbackEntry {
    /// Build an entry with trimmed fields. Blank notes become `None`.
    pub fn new(name: &str, ethnicity: &str, notes: Option<&str>) -> Self {
        Self {
            name: name.trim().to_string(),
            ethnicity: ethnicity.trim().to_string(),
            notes: notes
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        }
    }

    /// Whether both the name and the label are present.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.ethnicity.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_fields() {
        let entry = FeedbackEntry::new("  Rahul Sharma ", " Indian", Some("  "));
        assert_eq!(entry.name, "Rahul Sharma");
        assert_eq!(entry.ethnicity, "Indian");
        assert!(entry.notes.is_none());
        assert!(entry.is_complete());
    }

    #[test]
    fn test_blank_label_is_incomplete() {
        let entry = FeedbackEntry::new("Rahul Sharma", "   ", None);
        assert!(!entry.is_complete());
    }
}
