//! Property tests over generated snapshots

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use proptest::prelude::*;
use serde_json::{json, Value};
use sheetdiff_core::model::metadata as meta;
use sheetdiff_core::present::filter;
use sheetdiff_core::{
    Audience, Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext,
    DetectionEngine, EngineConfig, PresentationConfig,
};

const ABILITIES: [&str; 6] = [
    "strength",
    "dexterity",
    "constitution",
    "intelligence",
    "wisdom",
    "charisma",
];
const FEATS: [&str; 5] = ["Alert", "Tough", "Observant", "Lucky", "Great Weapon Master"];
const SKILLS: [&str; 5] = ["athletics", "stealth", "perception", "arcana", "insight"];

fn engine() -> DetectionEngine {
    DetectionEngine::new().with_config(EngineConfig {
        parallel: false,
        disabled: Vec::new(),
    })
}

fn snapshot(level: i64, scores: &[i64], feats: &[bool], skills: &[bool], hp: i64) -> Value {
    let ability_scores: serde_json::Map<String, Value> = ABILITIES
        .iter()
        .zip(scores)
        .map(|(a, s)| (a.to_string(), json!(s)))
        .collect();
    let feat_list: Vec<Value> = FEATS
        .iter()
        .zip(feats)
        .filter(|(_, on)| **on)
        .map(|(f, _)| json!({"name": f}))
        .collect();
    let skill_map: serde_json::Map<String, Value> = SKILLS
        .iter()
        .zip(skills)
        .map(|(s, on)| (s.to_string(), json!({"proficient": on})))
        .collect();
    json!({
        "character_info": {
            "character_id": "c-prop",
            "name": "Prop",
            "level": level,
            "classes": [{"name": "Wizard", "level": level}]
        },
        "abilities": {"ability_scores": ability_scores},
        "proficiencies": {"skills": skill_map},
        "features": {"feats": feat_list},
        "spellcasting": {"spellcasting_ability": "intelligence"},
        "combat": {"hit_points": {"maximum": hp}}
    })
}

fn arb_snapshot() -> impl Strategy<Value = Value> {
    (
        1i64..=20,
        prop::collection::vec(3i64..=20, 6),
        prop::collection::vec(any::<bool>(), FEATS.len()),
        prop::collection::vec(any::<bool>(), SKILLS.len()),
        1i64..=200,
    )
        .prop_map(|(level, scores, feats, skills, hp)| snapshot(level, &scores, &feats, &skills, hp))
}

fn is_ability_cascade(path: &str) -> bool {
    path.starts_with("skills.")
        || path.starts_with("saving_throws.")
        || path.starts_with("spellcasting.")
        || path.starts_with("passive_skills.")
        || path == "combat.initiative"
}

proptest! {
    #[test]
    fn identical_snapshots_yield_no_changes(s in arb_snapshot()) {
        let ctx = DetectionContext::new("c-prop", "Prop");
        let result = engine().detect(&s, &s, &ctx).unwrap();
        prop_assert!(result.changes.is_empty(), "{:?}", result.changes);
    }

    #[test]
    fn same_modifier_ability_change_has_no_cascade(
        ability in 0usize..6,
        even in 2i64..=9,
        skills in prop::collection::vec(any::<bool>(), SKILLS.len()),
    ) {
        // 2e and 2e + 1 share a modifier
        let x = even * 2;
        let mut old_scores = vec![12i64; 6];
        let mut new_scores = old_scores.clone();
        old_scores[ability] = x;
        new_scores[ability] = x + 1;
        let feats = [false; 5];
        let old = snapshot(5, &old_scores, &feats, &skills, 30);
        let new = snapshot(5, &new_scores, &feats, &skills, 30);

        let ctx = DetectionContext::new("c-prop", "Prop");
        let result = engine().detect(&old, &new, &ctx).unwrap();
        let score_path = format!("abilities.{}", ABILITIES[ability]);
        prop_assert!(result.change(&score_path).is_some());
        for c in &result.changes {
            prop_assert!(!is_ability_cascade(&c.field_path), "unexpected {}", c.field_path);
        }
    }

    #[test]
    fn cascade_depths_follow_edges(old in arb_snapshot(), new in arb_snapshot()) {
        let ctx = DetectionContext::new("c-prop", "Prop");
        let result = engine().detect(&old, &new, &ctx).unwrap();
        for c in &result.changes {
            prop_assert!(c.old_value != c.new_value);
            let depth = c.metadata[meta::CASCADE_DEPTH].as_u64().unwrap();
            match c.meta_str(meta::CAUSED_BY) {
                Some(cause) => {
                    let parent = result.change(cause).unwrap();
                    let parent_depth = parent.metadata[meta::CASCADE_DEPTH].as_u64().unwrap();
                    prop_assert_eq!(depth, parent_depth + 1);
                }
                None => prop_assert_eq!(depth, 0),
            }
            if let Some(confidence) = c.metadata.get(meta::CAUSATION_CONFIDENCE) {
                let confidence = confidence.as_f64().unwrap();
                prop_assert!((0.0..=1.0).contains(&confidence));
            }
        }
    }

    #[test]
    fn discord_high_only_filter(priorities in prop::collection::vec(0u8..4, 0..30)) {
        let changes: Vec<Change> = priorities
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let priority = [
                    ChangePriority::Low,
                    ChangePriority::Medium,
                    ChangePriority::High,
                    ChangePriority::Critical,
                ][*p as usize];
                Change::new(
                    format!("x.{i}"),
                    ChangeType::Modified,
                    ChangeCategory::Metadata,
                    priority,
                    "x",
                    Utc::now(),
                )
            })
            .collect();
        let config = PresentationConfig {
            discord_only_high_priority: true,
            ..Default::default()
        };
        let kept = filter(&changes, Audience::Discord, &config);
        let expected: Vec<&Change> = changes
            .iter()
            .filter(|c| c.priority >= ChangePriority::High)
            .collect();
        prop_assert!(kept.len() <= changes.len());
        prop_assert_eq!(kept, expected);
    }
}
