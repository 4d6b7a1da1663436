//! Inventory items, equip/attune state and currency.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::{CharacterSheet, ItemEntry};
use crate::model::{
    Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics,
};
use crate::rules::RulesData;

use super::{ChangeDetector, DetectorBase};

pub struct InventoryDetector {
    base: DetectorBase,
}

impl InventoryDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "inventory",
                PriorityRules::new()
                    .rule("equipment.inventory.*.quantity", ChangePriority::Low)
                    .rule("equipment.inventory.*.equipped", ChangePriority::Medium)
                    .rule("equipment.inventory.*.attuned", ChangePriority::Medium)
                    .rule("equipment.currency.*", ChangePriority::Low)
                    .domain_default(ChangeType::Added, ChangePriority::Medium)
                    .domain_default(ChangeType::Removed, ChangePriority::Medium),
            ),
        }
    }

    fn toggle(
        &self,
        ctx: &DetectionContext,
        path: String,
        item: &ItemEntry,
        state: &str,
        before: bool,
        after: bool,
    ) -> Option<Change> {
        if before == after {
            return None;
        }
        let description = if after {
            format!("{} {state}", item.name)
        } else {
            format!("{} no longer {state}", item.name)
        };
        Some(
            self.base
                .change(ctx, path, ChangeType::Modified, ChangeCategory::Equipment, description)
                .with_values(Some(Value::Bool(before)), Some(Value::Bool(after)))
                .with_meta("item", item.name.as_str()),
        )
    }
}

impl Default for InventoryDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn item_value(item: &ItemEntry) -> Value {
    Value::Object(item.fields.clone())
}

fn by_key(items: &[ItemEntry]) -> BTreeMap<&str, &ItemEntry> {
    items.iter().map(|i| (i.key.as_str(), i)).collect()
}

impl ChangeDetector for InventoryDetector {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn detect(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
        _rules: &RulesData,
        _diag: &mut Diagnostics,
    ) -> Result<Vec<Change>, ExError> {
        let old_items = by_key(&old.inventory);
        let new_items = by_key(&new.inventory);
        let mut changes = Vec::new();

        for item in &new.inventory {
            let path = format!("equipment.inventory.{}", item.segment);
            let Some(previous) = old_items.get(item.key.as_str()) else {
                let quantity = if item.quantity > 1 {
                    format!(" x{}", item.quantity)
                } else {
                    String::new()
                };
                changes.push(
                    self.base
                        .change(
                            ctx,
                            &path,
                            ChangeType::Added,
                            ChangeCategory::Inventory,
                            format!("Acquired {}{quantity}", item.name),
                        )
                        .with_values(None, Some(item_value(item))),
                );
                continue;
            };
            if let Some(c) = self.base.numeric(
                ctx,
                format!("{path}.quantity"),
                ChangeCategory::Inventory,
                &format!("{} quantity", item.name),
                previous.quantity,
                item.quantity,
            ) {
                changes.push(c);
            }
            changes.extend(self.toggle(
                ctx,
                format!("{path}.equipped"),
                item,
                "equipped",
                previous.equipped,
                item.equipped,
            ));
            changes.extend(self.toggle(
                ctx,
                format!("{path}.attuned"),
                item,
                "attuned",
                previous.attuned,
                item.attuned,
            ));
        }
        for item in &old.inventory {
            if !new_items.contains_key(item.key.as_str()) {
                changes.push(
                    self.base
                        .change(
                            ctx,
                            format!("equipment.inventory.{}", item.segment),
                            ChangeType::Removed,
                            ChangeCategory::Inventory,
                            format!("Lost {}", item.name),
                        )
                        .with_values(Some(item_value(item)), None),
                );
            }
        }

        let coins: BTreeSet<&String> = old.currency.keys().chain(new.currency.keys()).collect();
        for coin in coins {
            let before = old.currency.get(coin).copied().unwrap_or(0);
            let after = new.currency.get(coin).copied().unwrap_or(0);
            if let Some(c) = self.base.numeric(
                ctx,
                format!("equipment.currency.{coin}"),
                ChangeCategory::Inventory,
                &coin.to_uppercase(),
                before,
                after,
            ) {
                changes.push(c);
            }
        }
        Ok(changes)
    }
}
