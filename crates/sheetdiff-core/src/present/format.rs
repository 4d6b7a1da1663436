//! Text rendering for both audiences.

use serde_json::Value;

use crate::model::{Change, ChangeAttribution, ChangeCategory, ChangeCausation};

pub fn category_emoji(category: ChangeCategory) -> &'static str {
    match category {
        ChangeCategory::BasicInfo => "📋",
        ChangeCategory::Abilities => "💪",
        ChangeCategory::Skills => "🎯",
        ChangeCategory::Combat => "⚔️",
        ChangeCategory::Spells => "✨",
        ChangeCategory::Features => "🌟",
        ChangeCategory::Equipment => "🛡️",
        ChangeCategory::Inventory => "🎒",
        ChangeCategory::Progression => "📈",
        ChangeCategory::Social => "💬",
        ChangeCategory::Metadata => "🏷️",
    }
}

/// `"{emoji} {description}"`, cut to at most `max_len` characters.
pub fn brief_line(change: &Change, max_len: usize) -> String {
    let line = format!("{} {}", category_emoji(change.category), change.description);
    truncate(&line, max_len)
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    if max_len == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max_len - 1).collect();
    out.push('…');
    out
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "none".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Multi-sentence audit text: what changed, how it is classified, and where
/// attribution or causation is known, why.
pub fn verbose_text(
    change: &Change,
    attribution: Option<&ChangeAttribution>,
    causation: Option<&ChangeCausation>,
) -> String {
    let mut out = String::new();
    out.push_str(change.description.trim_end_matches('.'));
    out.push('.');

    if change.old_value.is_some() || change.new_value.is_some() {
        out.push_str(&format!(
            " Value: {} → {}.",
            render_value(change.old_value.as_ref()),
            render_value(change.new_value.as_ref())
        ));
    }
    out.push_str(&format!(
        " Category: {}, priority: {}.",
        change.category.as_str(),
        change.priority.as_str()
    ));

    if let Some(a) = attribution {
        out.push_str(&format!(
            " Source: {} ({}, {}).",
            a.source_name, a.source_type, a.source
        ));
    }

    if let Some(c) = causation {
        let cause = c.trigger_details.get("cause").and_then(Value::as_str);
        let effects: Vec<&str> = c
            .related_changes
            .iter()
            .map(String::as_str)
            .filter(|p| Some(*p) != cause)
            .collect();
        if let Some(cause) = cause {
            out.push_str(&format!(
                " Caused by {} via {} (cascade depth {}).",
                cause, c.trigger, c.cascade_depth
            ));
        }
        if !effects.is_empty() {
            out.push_str(&format!(
                " Led to {} related change{}: {}.",
                effects.len(),
                if effects.len() == 1 { "" } else { "s" },
                effects.join(", ")
            ));
        }
    }
    out
}
