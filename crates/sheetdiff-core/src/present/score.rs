//! Importance scores and roll-up summaries.

use serde_json::Value;

use crate::model::{Change, ChangeAttribution, ChangeCategory, ChangeCausation, ChangePriority};

const RELATED_WEIGHT: i64 = 3;
const RELATED_CAP: i64 = 15;

fn priority_base(priority: ChangePriority) -> i64 {
    match priority {
        ChangePriority::Low => 10,
        ChangePriority::Medium => 25,
        ChangePriority::High => 50,
        ChangePriority::Critical => 80,
    }
}

fn category_weight(category: ChangeCategory) -> i64 {
    match category {
        ChangeCategory::Progression => 10,
        ChangeCategory::Abilities | ChangeCategory::Combat => 8,
        ChangeCategory::Features | ChangeCategory::Spells => 6,
        ChangeCategory::Skills | ChangeCategory::Equipment => 4,
        ChangeCategory::Inventory | ChangeCategory::BasicInfo => 2,
        ChangeCategory::Social | ChangeCategory::Metadata => 0,
    }
}

/// Ranking score. Never negative.
pub fn importance(
    change: &Change,
    attribution: Option<&ChangeAttribution>,
    causation: Option<&ChangeCausation>,
) -> i64 {
    let mut score = priority_base(change.priority) + category_weight(change.category);
    if attribution.is_some() {
        score += 5;
    }
    if let Some(c) = causation {
        let cause = c.trigger_details.get("cause").and_then(Value::as_str);
        let effects = c
            .related_changes
            .iter()
            .filter(|p| Some(p.as_str()) != cause)
            .count() as i64;
        score += (effects * RELATED_WEIGHT).min(RELATED_CAP);
        score -= 2 * i64::from(c.cascade_depth);
    }
    score.max(0)
}

/// One-line roll-up: counts per category (display order) then per priority
/// (most significant first). Zero counts are omitted.
pub fn summarize(changes: &[&Change]) -> String {
    let by_category: Vec<String> = ChangeCategory::ALL
        .iter()
        .filter_map(|cat| {
            let n = changes.iter().filter(|c| c.category == *cat).count();
            (n > 0).then(|| format!("{} {}", cat.as_str(), n))
        })
        .collect();
    let by_priority: Vec<String> = [
        ChangePriority::Critical,
        ChangePriority::High,
        ChangePriority::Medium,
        ChangePriority::Low,
    ]
    .iter()
    .filter_map(|p| {
        let n = changes.iter().filter(|c| c.priority == *p).count();
        (n > 0).then(|| format!("{} {}", p.as_str(), n))
    })
    .collect();
    format!(
        "{} changes ({}); priority: {}",
        changes.len(),
        by_category.join(", "),
        by_priority.join(", ")
    )
}
