//! Category histogram and actionable tally over per-item outcomes.

use std::collections::BTreeMap;
use uuid::Uuid;

use super::batch::ItemOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTally {
    /// Category label -> number of successful items carrying it
    pub categorized: BTreeMap<String, usize>,
    /// Successful items with an extracted action
    pub actionable: usize,
}

/// Fold outcomes into a `CategoryTally`. Failures contribute nothing.
pub fn fold<'a, I>(outcomes: I) -> CategoryTally
where
    I: IntoIterator<Item = (&'a Uuid, &'a ItemOutcome)>,
{
    let mut tally = CategoryTally::default();

    for (_, outcome) in outcomes {
        let ItemOutcome::Success(analysis) = outcome else {
            continue;
        };

        if let Some(category) = analysis.category {
            *tally
                .categorized
                .entry(category.as_str().to_string())
                .or_insert(0) += 1;
        }
        if analysis.action.has_action {
            tally.actionable += 1;
        }
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ideabox_types::{ActionExtraction, EmailAnalysis, EmailCategory};
    use std::collections::HashMap;

    fn success(category: Option<EmailCategory>, has_action: bool) -> ItemOutcome {
        ItemOutcome::Success(EmailAnalysis {
            category,
            action: ActionExtraction {
                has_action,
                ..Default::default()
            },
            client_match: None,
            summary: None,
            topics: vec![],
            tokens_used: 0,
            model: "test-model".to_string(),
            processing_time_ms: 0,
            analyzed_at: Utc::now(),
        })
    }

    #[test]
    fn histogram_counts_successes_only() {
        let outcomes: Vec<(Uuid, ItemOutcome)> = vec![
            (Uuid::new_v4(), success(Some(EmailCategory::Newsletter), false)),
            (Uuid::new_v4(), success(Some(EmailCategory::Event), false)),
            (Uuid::new_v4(), success(Some(EmailCategory::Newsletter), false)),
            (Uuid::new_v4(), ItemOutcome::Failure("model call failed".to_string())),
        ];

        let tally = fold(outcomes.iter().map(|(id, o)| (id, o)));

        assert_eq!(tally.categorized.len(), 2);
        assert_eq!(tally.categorized["newsletter"], 2);
        assert_eq!(tally.categorized["event"], 1);
        assert_eq!(tally.actionable, 0);
    }

    #[test]
    fn actionable_counts_has_action_flag() {
        let mut outcomes = HashMap::new();
        outcomes.insert(Uuid::new_v4(), success(Some(EmailCategory::ActionRequired), true));
        outcomes.insert(Uuid::new_v4(), success(Some(EmailCategory::Personal), false));
        outcomes.insert(Uuid::new_v4(), success(None, true));
        outcomes.insert(Uuid::new_v4(), ItemOutcome::Failure("timeout".to_string()));

        let tally = fold(&outcomes);

        assert_eq!(tally.actionable, 2);
        assert_eq!(tally.categorized.values().sum::<usize>(), 2);
    }

    #[test]
    fn empty_outcomes_yield_empty_tally() {
        let outcomes: HashMap<Uuid, ItemOutcome> = HashMap::new();
        assert_eq!(fold(&outcomes), CategoryTally::default());
    }
}
