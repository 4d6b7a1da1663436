//! Priority classification shared by every detector.
//!
//! Resolution order for `(field_path, change_type)`:
//! 1. a fixed priority, when the domain forces one
//! 2. the first explicit path rule that matches
//! 3. the domain default for the change type
//! 4. the global change-type default

use std::collections::BTreeMap;

use crate::model::{ChangePriority, ChangeType};

/// Global default: added/removed ⇒ high, incremented/decremented ⇒ medium,
/// everything else ⇒ low.
pub fn global_default(change_type: ChangeType) -> ChangePriority {
    match change_type {
        ChangeType::Added | ChangeType::Removed => ChangePriority::High,
        ChangeType::Incremented | ChangeType::Decremented => ChangePriority::Medium,
        _ => ChangePriority::Low,
    }
}

/// One explicit rule: a dotted pattern plus an optional change-type filter.
///
/// Pattern segments match literally, `*` matches exactly one segment and a
/// trailing `**` matches any remainder (including none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pattern: Vec<String>,
    change_type: Option<ChangeType>,
    priority: ChangePriority,
}

impl PathRule {
    pub fn new(pattern: &str, priority: ChangePriority) -> Self {
        Self {
            pattern: pattern.split('.').map(str::to_string).collect(),
            change_type: None,
            priority,
        }
    }

    pub fn only_for(mut self, change_type: ChangeType) -> Self {
        self.change_type = Some(change_type);
        self
    }

    pub fn matches(&self, field_path: &str, change_type: ChangeType) -> bool {
        if self.change_type.is_some_and(|t| t != change_type) {
            return false;
        }
        let segments: Vec<&str> = field_path.split('.').collect();
        let mut i = 0;
        for (n, part) in self.pattern.iter().enumerate() {
            if part == "**" && n == self.pattern.len() - 1 {
                return true;
            }
            match segments.get(i) {
                Some(seg) if part == "*" || part == seg => i += 1,
                _ => return false,
            }
        }
        i == segments.len()
    }
}

/// Per-detector priority table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityRules {
    explicit: Vec<PathRule>,
    domain_defaults: BTreeMap<ChangeType, ChangePriority>,
    fixed: Option<ChangePriority>,
}

impl PriorityRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every change of the domain gets `priority`, regardless of inputs
    pub fn fixed(priority: ChangePriority) -> Self {
        Self {
            fixed: Some(priority),
            ..Self::default()
        }
    }

    pub fn rule(mut self, pattern: &str, priority: ChangePriority) -> Self {
        self.explicit.push(PathRule::new(pattern, priority));
        self
    }

    pub fn rule_for(
        mut self,
        pattern: &str,
        change_type: ChangeType,
        priority: ChangePriority,
    ) -> Self {
        self.explicit
            .push(PathRule::new(pattern, priority).only_for(change_type));
        self
    }

    pub fn domain_default(mut self, change_type: ChangeType, priority: ChangePriority) -> Self {
        self.domain_defaults.insert(change_type, priority);
        self
    }

    pub fn resolve(&self, field_path: &str, change_type: ChangeType) -> ChangePriority {
        if let Some(p) = self.fixed {
            return p;
        }
        if let Some(rule) = self
            .explicit
            .iter()
            .find(|r| r.matches(field_path, change_type))
        {
            return rule.priority;
        }
        self.domain_defaults
            .get(&change_type)
            .copied()
            .unwrap_or_else(|| global_default(change_type))
    }
}
