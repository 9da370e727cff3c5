use serde::Serialize;
use serde_with::skip_serializing_none;

/// Result of one item of a batch operation.
#[skip_serializing_none]
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub public_id: String,
    pub success: bool,
    pub new_public_id: Option<String>,
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn done(public_id: impl Into<String>) -> Self {
        ItemOutcome {
            public_id: public_id.into(),
            success: true,
            new_public_id: None,
            error: None,
        }
    }

    pub fn moved(public_id: impl Into<String>, new_public_id: impl Into<String>) -> Self {
        ItemOutcome {
            new_public_id: Some(new_public_id.into()),
            ..ItemOutcome::done(public_id)
        }
    }

    pub fn failed(public_id: impl Into<String>, error: impl ToString) -> Self {
        ItemOutcome {
            public_id: public_id.into(),
            success: false,
            new_public_id: None,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregate of a batch that never stops at the first failure.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<ItemOutcome>,
}

impl FromIterator<ItemOutcome> for BatchReport {
    fn from_iter<I: IntoIterator<Item = ItemOutcome>>(iter: I) -> Self {
        let items: Vec<ItemOutcome> = iter.into_iter().collect();
        let succeeded = items.iter().filter(|item| item.success).count();

        BatchReport {
            total: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let report: BatchReport = vec![
            ItemOutcome::done("a"),
            ItemOutcome::failed("b", "boom"),
            ItemOutcome::moved("c", "archived/c"),
        ]
        .into_iter()
        .collect();

        assert_eq!((report.total, report.succeeded, report.failed), (3, 2, 1));
    }

    #[test]
    fn test_outcome_skips_empty_fields() {
        let json = serde_json::to_value(ItemOutcome::done("a")).unwrap();
        assert_eq!(json, serde_json::json!({ "public_id": "a", "success": true }));
    }
}
