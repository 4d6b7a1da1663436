//! Subclass selection and subclass features.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::value::{as_text, field};
use crate::extract::{CharacterSheet, ClassEntry, Record};
use crate::model::metadata::{self as meta, trigger};
use crate::model::{
    Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics,
};
use crate::rules::{table_key, ClassRules, RulesData};

use super::{ChangeDetector, DetectorBase};

pub struct SubclassDetector {
    base: DetectorBase,
}

impl SubclassDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "subclass",
                PriorityRules::new()
                    .rule("classes.*.subclass", ChangePriority::High)
                    .rule("classes.*.subclass_features.*", ChangePriority::Medium),
            ),
        }
    }
}

impl Default for SubclassDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn tag(feature: &Record, keys: &[&str]) -> Option<String> {
    field(&feature.fields, keys).and_then(as_text)
}

/// True when a feature is not tagged for a different class.
fn belongs_to_class(feature: &Record, class: &ClassEntry) -> bool {
    match tag(feature, &["class", "class_name"]) {
        Some(c) => table_key(&c) == table_key(&class.name),
        None => true,
    }
}

/// Subclass of `class` in `sheet`: the reported field, else inferred from
/// feature `subclass` tags, then `source` tags naming a known subclass, then
/// feature names listed for a known subclass.
pub fn infer_subclass(sheet: &CharacterSheet, class: &ClassEntry, rules: &RulesData) -> Option<String> {
    if let Some(s) = &class.subclass {
        return Some(s.clone());
    }
    let known = rules.class(&class.name);
    let features: Vec<&Record> = sheet
        .class_features
        .iter()
        .filter(|f| belongs_to_class(f, class))
        .collect();

    let by_subclass_tag = features.iter().find_map(|f| {
        let s = tag(f, &["subclass", "subclass_name"])?;
        match known {
            Some(k) if !k.subclasses.contains_key(&table_key(&s)) => None,
            _ => Some(s),
        }
    });
    if by_subclass_tag.is_some() {
        return by_subclass_tag;
    }

    let known = known?;
    let by_source = features.iter().find_map(|f| {
        let source = tag(f, &["source", "source_name"])?;
        known
            .subclasses
            .contains_key(&table_key(&source))
            .then_some(source)
    });
    if by_source.is_some() {
        return by_source;
    }

    features
        .iter()
        .find_map(|f| subclass_listing(known, &f.name))
        .map(display_name)
}

/// Known subclass whose feature list names `feature`.
fn subclass_listing<'r>(class: &'r ClassRules, feature: &str) -> Option<&'r str> {
    let wanted = table_key(feature);
    class
        .subclasses
        .iter()
        .find(|(_, sub)| sub.features.iter().any(|f| table_key(f) == wanted))
        .map(|(name, _)| name.as_str())
}

/// `battle master` → `Battle Master`
fn display_name(key: &str) -> String {
    key.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Features of `sheet` attributed to `subclass` of `class`, keyed by identity.
fn subclass_features<'s>(
    sheet: &'s CharacterSheet,
    class: &ClassEntry,
    subclass: &str,
    rules: &RulesData,
) -> BTreeMap<&'s str, &'s Record> {
    let sub_key = table_key(subclass);
    let listed = rules
        .class(&class.name)
        .and_then(|c| c.subclasses.get(&sub_key));
    sheet
        .class_features
        .iter()
        .filter(|f| belongs_to_class(f, class))
        .filter(|f| {
            let tagged = tag(f, &["subclass", "subclass_name"])
                .or_else(|| tag(f, &["source", "source_name"]))
                .is_some_and(|t| table_key(&t) == sub_key);
            let in_listing = listed
                .is_some_and(|l| l.features.iter().any(|n| table_key(n) == table_key(&f.name)));
            tagged || in_listing
        })
        .map(|f| (f.key.as_str(), f))
        .collect()
}

impl ChangeDetector for SubclassDetector {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn detect(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
        rules: &RulesData,
        _diag: &mut Diagnostics,
    ) -> Result<Vec<Change>, ExError> {
        let mut changes = Vec::new();
        for new_class in &new.classes {
            let Some(old_class) = old.class(&new_class.name) else {
                continue;
            };
            let before = infer_subclass(old, old_class, rules);
            let after = infer_subclass(new, new_class, rules);
            let path = format!("classes.{}.subclass", new_class.key);

            if let Some(change) = self.base.text_presence(
                ctx,
                &path,
                ChangeCategory::Features,
                &format!("{} subclass", new_class.name),
                before.as_deref(),
                after.as_deref(),
            ) {
                changes.push(change.with_meta(meta::CAUSED_BY_CLASS, new_class.name.as_str()));
                continue;
            }

            let Some(subclass) = after else {
                continue;
            };
            let old_features = subclass_features(old, old_class, &subclass, rules);
            let new_features = subclass_features(new, new_class, &subclass, rules);
            for (key, feature) in &new_features {
                if !old_features.contains_key(key) {
                    changes.push(
                        self.base
                            .change(
                                ctx,
                                format!("classes.{}.subclass_features.{}", new_class.key, feature.segment),
                                ChangeType::Added,
                                ChangeCategory::Features,
                                format!("{subclass} feature gained: {}", feature.name),
                            )
                            .with_values(None, Some(feature.to_value()))
                            .with_meta(meta::CAUSATION_TRIGGER, trigger::CLASS_FEATURE)
                            .with_meta(meta::CAUSED_BY_CLASS, new_class.name.as_str()),
                    );
                }
            }
            for (key, feature) in &old_features {
                if !new_features.contains_key(key) {
                    changes.push(
                        self.base
                            .change(
                                ctx,
                                format!("classes.{}.subclass_features.{}", new_class.key, feature.segment),
                                ChangeType::Removed,
                                ChangeCategory::Features,
                                format!("{subclass} feature lost: {}", feature.name),
                            )
                            .with_values(Some(feature.to_value()), None::<Value>)
                            .with_meta(meta::CAUSED_BY_CLASS, new_class.name.as_str()),
                    );
                }
            }
        }
        Ok(changes)
    }
}
