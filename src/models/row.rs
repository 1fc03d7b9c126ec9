/// How a single data row got its label.
///
/// - `FeedbackHit`: exact match in the feedback store, no API call
/// - `ApiQueried`: labeled by the classifier
/// - `Failed`: the classifier errored; the row is labeled `Unknown`
/// - `Skipped`: empty name; labeled `Unknown` without an API call
/// - `BeyondLimit`: past `--limit`; left blank without an API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    FeedbackHit,
    ApiQueried,
    Failed,
    Skipped,
    BeyondLimit,
}

impl RowOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeedbackHit => "feedback_hit",
            Self::ApiQueried => "api_queried",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::BeyondLimit => "beyond_limit",
        }
    }
}

/// Per-outcome counters for one labeling run. The header row is not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub feedback_hits: usize,
    pub api_queried: usize,
    pub failed: usize,
    pub skipped: usize,
    pub beyond_limit: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: RowOutcome) {
        self.rows += 1;
        match outcome {
            RowOutcome::FeedbackHit => self.feedback_hits += 1,
            RowOutcome::ApiQueried => self.api_queried += 1,
            RowOutcome::Failed => self.failed += 1,
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::BeyondLimit => self.beyond_limit += 1,
        }
    }

    /// Number of requests sent to the classifier, successful or not.
    pub fn api_calls(&self) -> usize {
        self.api_queried + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_each_outcome() {
        let mut summary = RunSummary::default();
        summary.record(RowOutcome::FeedbackHit);
        summary.record(RowOutcome::ApiQueried);
        summary.record(RowOutcome::Failed);
        summary.record(RowOutcome::BeyondLimit);

        assert_eq!(summary.rows, 4);
        assert_eq!(summary.feedback_hits, 1);
        assert_eq!(summary.api_calls(), 2);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn test_outcome_names_are_snake_case() {
        assert_eq!(RowOutcome::FeedbackHit.as_str(), "feedback_hit");
        assert_eq!(RowOutcome::BeyondLimit.as_str(), "beyond_limit");
    }
}
