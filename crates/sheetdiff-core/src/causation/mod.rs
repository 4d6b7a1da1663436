//! Cross-domain causation analysis.
//!
//! Runs after aggregation. Declared `caused_by` links become edges first;
//! changes still lacking a cause are then offered to every correlator and
//! the most confident link wins. The analyzer fails soft: anything it cannot link is left alone and
//! noted in the diagnostics.

pub mod attribution;
pub mod correlators;
pub mod graph;

pub use attribution::attribute;
pub use correlators::{default_correlators, Correlation, CorrelationContext, Correlator, Signal};
pub use graph::{CausalGraph, Edge, EdgeRejection};

use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::extract::CharacterSheet;
use crate::model::metadata::{self as meta, trigger};
use crate::model::{Change, ChangeAttribution, ChangeCausation, Diagnostics};
use crate::rules::RulesData;

const ANALYZER: &str = "causation";

/// Confidence of a declared link that carries no confidence of its own
pub const DECLARED_CONFIDENCE: f64 = 0.9;

/// Attributions and causations keyed by field path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CausationReport {
    pub attributions: BTreeMap<String, ChangeAttribution>,
    pub causations: BTreeMap<String, ChangeCausation>,
}

pub struct CausationAnalyzer {
    correlators: Vec<Box<dyn Correlator>>,
}

impl Default for CausationAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CausationAnalyzer {
    pub fn new() -> Self {
        Self::with_correlators(default_correlators())
    }

    pub fn with_correlators(correlators: Vec<Box<dyn Correlator>>) -> Self {
        Self { correlators }
    }

    /// Link the batch and annotate every change with its cascade depth.
    pub fn analyze(
        &self,
        changes: &mut [Change],
        old: &CharacterSheet,
        new: &CharacterSheet,
        rules: &RulesData,
        diag: &mut Diagnostics,
    ) -> CausationReport {
        let mut graph = CausalGraph::new(changes.iter().map(|c| c.field_path.clone()));
        self.declared_edges(changes, &mut graph, diag);
        let ctx = CorrelationContext { old, new, rules };
        self.correlated_edges(changes, &mut graph, &ctx);
        annotate(changes, &graph);

        let mut report = CausationReport::default();
        for change in changes.iter() {
            if let Some(causation) = causation_for(change, &graph) {
                report.causations.insert(change.field_path.clone(), causation);
            }
            if let Some(attribution) = attribute(change, new) {
                report
                    .attributions
                    .insert(change.field_path.clone(), attribution);
            }
        }
        report
    }

    fn declared_edges(&self, changes: &mut [Change], graph: &mut CausalGraph, diag: &mut Diagnostics) {
        for change in changes.iter_mut() {
            let Some(cause) = change.meta_str(meta::CAUSED_BY).map(str::to_string) else {
                continue;
            };
            let edge = Edge {
                cause: cause.clone(),
                effect: change.field_path.clone(),
                confidence: change
                    .metadata
                    .get(meta::CAUSATION_CONFIDENCE)
                    .and_then(Value::as_f64)
                    .unwrap_or(DECLARED_CONFIDENCE),
                trigger: change
                    .meta_str(meta::CAUSATION_TRIGGER)
                    .unwrap_or(trigger::ROOT_CAUSE)
                    .to_string(),
                signals: vec!["declared".to_string()],
            };
            if let Err(rejection) = graph.add_edge(edge) {
                diag.record(
                    ANALYZER,
                    &change.field_path,
                    format!("declared cause '{cause}' dropped: {}", rejection.as_str()),
                );
                change.metadata.remove(meta::CAUSED_BY);
            }
        }
    }

    fn correlated_edges(
        &self,
        changes: &mut [Change],
        graph: &mut CausalGraph,
        ctx: &CorrelationContext<'_>,
    ) {
        for effect_idx in 0..changes.len() {
            if graph.has_cause(&changes[effect_idx].field_path) {
                continue;
            }
            let Some((cause_idx, correlation)) = self.best_cause(changes, effect_idx, graph, ctx)
            else {
                continue;
            };
            let cause_path = changes[cause_idx].field_path.clone();
            let effect = &mut changes[effect_idx];
            effect
                .metadata
                .insert(meta::CAUSED_BY.to_string(), Value::String(cause_path));
            effect
                .metadata
                .entry(meta::CAUSATION_TRIGGER.to_string())
                .or_insert_with(|| Value::from(correlation.trigger));
            if let Some((key, name)) = correlation.attribution {
                effect
                    .metadata
                    .entry(key.to_string())
                    .or_insert(Value::String(name));
            }
        }
    }

    /// Most confident acceptable cause across all correlators. Ties go to
    /// the earlier correlator, then the earlier batch position. The accepted
    /// edge is already inserted on return.
    fn best_cause(
        &self,
        changes: &[Change],
        effect_idx: usize,
        graph: &mut CausalGraph,
        ctx: &CorrelationContext<'_>,
    ) -> Option<(usize, Correlation)> {
        let effect = &changes[effect_idx];
        let mut candidates: Vec<(usize, Correlation)> = self
            .correlators
            .iter()
            .flat_map(|correlator| {
                changes
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != effect_idx)
                    .filter_map(|(i, cause)| correlator.correlate(cause, effect, ctx).map(|c| (i, c)))
            })
            .filter(|(_, c)| c.confidence() >= correlators::MIN_CONFIDENCE)
            .collect();
        // stable sort keeps correlator then batch order among equal confidences
        candidates.sort_by(|a, b| b.1.confidence().total_cmp(&a.1.confidence()));
        for (cause_idx, correlation) in candidates {
            let edge = Edge {
                cause: changes[cause_idx].field_path.clone(),
                effect: effect.field_path.clone(),
                confidence: correlation.confidence(),
                trigger: correlation.trigger.to_string(),
                signals: correlation
                    .signals
                    .iter()
                    .map(|s| s.name.to_string())
                    .collect(),
            };
            if graph.add_edge(edge).is_ok() {
                return Some((cause_idx, correlation));
            }
        }
        None
    }
}

/// Stamp depth, confidence and related effects into change metadata.
fn annotate(changes: &mut [Change], graph: &CausalGraph) {
    for change in changes.iter_mut() {
        let path = change.field_path.clone();
        change
            .metadata
            .insert(meta::CASCADE_DEPTH.to_string(), Value::from(graph.depth(&path)));
        if let Some(edge) = graph.cause_of(&path) {
            change
                .metadata
                .insert(meta::CAUSATION_CONFIDENCE.to_string(), Value::from(edge.confidence));
        }
        let effects = graph.effects_of(&path);
        if !effects.is_empty() {
            change
                .metadata
                .insert(meta::RELATED_CHANGES.to_string(), json!(effects));
        }
    }
}

fn causation_for(change: &Change, graph: &CausalGraph) -> Option<ChangeCausation> {
    let path = change.field_path.as_str();
    let effects = graph.effects_of(path);
    match graph.cause_of(path) {
        Some(edge) => {
            let mut related = vec![edge.cause.clone()];
            related.extend(effects.iter().cloned());
            let mut details = BTreeMap::new();
            details.insert("cause".to_string(), Value::String(edge.cause.clone()));
            details.insert("confidence".to_string(), Value::from(edge.confidence));
            details.insert("signals".to_string(), json!(edge.signals));
            Some(ChangeCausation {
                trigger: edge.trigger.clone(),
                trigger_details: details,
                related_changes: related,
                cascade_depth: graph.depth(path),
            })
        }
        None if !effects.is_empty() => {
            let mut details = BTreeMap::new();
            details.insert("effects".to_string(), Value::from(effects.len()));
            Some(ChangeCausation {
                trigger: change
                    .meta_str(meta::CAUSATION_TRIGGER)
                    .unwrap_or(trigger::ROOT_CAUSE)
                    .to_string(),
                trigger_details: details,
                related_changes: effects.to_vec(),
                cascade_depth: 0,
            })
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::PriorityRules;
    use crate::detectors::test_support::{ctx, sheet};
    use crate::detectors::DetectorBase;
    use crate::model::ChangeCategory;

    fn numeric(path: &str, old: i64, new: i64) -> Change {
        DetectorBase::new("test", PriorityRules::new())
            .numeric(&ctx(), path, ChangeCategory::Skills, path, old, new)
            .unwrap()
    }

    fn run(changes: &mut [Change], old: &Value, new: &Value) -> (CausationReport, Diagnostics) {
        let rules = RulesData::builtin();
        let mut diag = Diagnostics::new();
        let report = CausationAnalyzer::new().analyze(changes, &sheet(old), &sheet(new), &rules, &mut diag);
        (report, diag)
    }

    #[test]
    fn test_declared_chain_depths() {
        let mut changes = vec![
            numeric("character_info.level", 4, 5),
            numeric("proficiencies.proficiency_bonus", 2, 3)
                .with_meta(meta::CAUSED_BY, "character_info.level")
                .with_meta(meta::CAUSATION_TRIGGER, "level_progression"),
            numeric("skills.athletics.bonus", 4, 5),
        ];
        let old = json!({"character_info": {"level": 4},
                         "proficiencies": {"skills": {"athletics": {"proficient": true}}}});
        let new = json!({"character_info": {"level": 5},
                         "proficiencies": {"skills": {"athletics": {"proficient": true}}}});
        let (report, _) = run(&mut changes, &old, &new);

        assert_eq!(changes[0].metadata[meta::CASCADE_DEPTH], json!(0));
        assert_eq!(changes[1].metadata[meta::CASCADE_DEPTH], json!(1));
        assert_eq!(changes[2].metadata[meta::CASCADE_DEPTH], json!(2));
        assert_eq!(changes[2].meta_str(meta::CAUSED_BY), Some("proficiencies.proficiency_bonus"));

        let root = &report.causations["character_info.level"];
        assert_eq!(root.cascade_depth, 0);
        assert_eq!(root.related_changes, ["proficiencies.proficiency_bonus"]);
        let pb = &report.causations["proficiencies.proficiency_bonus"];
        assert_eq!(pb.trigger, "level_progression");
        assert_eq!(pb.related_changes, ["character_info.level", "skills.athletics.bonus"]);
        let skill = &report.causations["skills.athletics.bonus"];
        assert_eq!(skill.cascade_depth, 2);
        // delta 0.5 + direction 0.1 + proficient 0.2
        assert_eq!(skill.trigger_details["confidence"], json!(0.8));
    }

    #[test]
    fn test_stronger_correlation_beats_earlier_correlator() {
        let mut changes = vec![
            numeric("character_info.level", 8, 9),
            numeric("abilities.strength", 15, 16),
            numeric("proficiencies.proficiency_bonus", 3, 4),
            numeric("skills.arcana.bonus", 3, 4),
        ];
        let sheet_at = |level: i64, strength: i64| {
            json!({"character_info": {"level": level},
                   "abilities": {"ability_scores": {"strength": strength, "intelligence": 10}},
                   "proficiencies": {"skills": {"arcana": {"proficient": true}}}})
        };
        let (report, _) = run(&mut changes, &sheet_at(8, 15), &sheet_at(9, 16));

        // strength does not govern arcana: 0.6 against the bonus link's 0.8
        let arcana = &changes[3];
        assert_eq!(arcana.meta_str(meta::CAUSED_BY), Some("proficiencies.proficiency_bonus"));
        assert_eq!(arcana.meta_str(meta::CAUSATION_TRIGGER), Some("level_progression"));
        assert!(!arcana.metadata.contains_key(meta::CAUSED_BY_ABILITY));
        assert_eq!(arcana.metadata[meta::CASCADE_DEPTH], json!(2));
        assert_eq!(report.causations["skills.arcana.bonus"].trigger_details["confidence"], json!(0.8));
        assert!(report.causations.get("abilities.strength").is_none());
    }

    #[test]
    fn test_dangling_declared_cause_is_dropped() {
        let mut changes = vec![numeric("abilities.strength", 14, 15)
            .with_meta(meta::CAUSED_BY, "features.feats.nowhere")];
        let (report, diag) = run(&mut changes, &json!({}), &json!({}));
        assert!(!changes[0].metadata.contains_key(meta::CAUSED_BY));
        assert_eq!(changes[0].metadata[meta::CASCADE_DEPTH], json!(0));
        assert!(report.causations.is_empty());
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn test_declared_cycle_rejected() {
        let mut changes = vec![
            numeric("a.x", 1, 2).with_meta(meta::CAUSED_BY, "a.y"),
            numeric("a.y", 1, 2).with_meta(meta::CAUSED_BY, "a.x"),
        ];
        let (_, diag) = run(&mut changes, &json!({}), &json!({}));
        assert_eq!(diag.len(), 1);
        assert!(changes[0].metadata.contains_key(meta::CAUSED_BY));
        assert!(!changes[1].metadata.contains_key(meta::CAUSED_BY));
    }

    #[test]
    fn test_unrelated_changes_stay_unlinked() {
        let mut changes = vec![
            numeric("equipment.currency.gp", 10, 50),
            numeric("character_info.experience_points", 100, 300),
        ];
        let (report, _) = run(&mut changes, &json!({}), &json!({}));
        assert!(report.causations.is_empty());
        assert!(report.attributions.is_empty());
        assert!(changes.iter().all(|c| c.metadata[meta::CASCADE_DEPTH] == json!(0)));
    }

    #[test]
    fn test_correlated_attribution() {
        let mut changes = vec![
            numeric("abilities.dexterity", 13, 14),
            numeric("combat.initiative", 1, 2),
        ];
        let (report, _) = run(&mut changes, &json!({}), &json!({}));
        let attribution = &report.attributions["combat.initiative"];
        assert_eq!(attribution.source, "ability_score_change");
        assert_eq!(attribution.source_name, "Dexterity");
        assert_eq!(changes[1].metadata[meta::CAUSATION_CONFIDENCE], json!(0.9));
    }
}
