//! Detection engine.
//!
//! The entry point is [`DetectionEngine::detect`], which checks the boundary
//! precondition, extracts both sheets once, fans the detectors out, joins,
//! aggregates and runs the causation analyzer.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::aggregate::aggregate;
use crate::causation::CausationAnalyzer;
use crate::detectors::{default_detectors, ChangeDetector};
use crate::errors::{ExError, ExErrorKind, SheetDiffError};
use crate::extract::CharacterSheet;
use crate::model::{Change, DetectionContext, DetectionResult, DetectorFailure, Diagnostics};
use crate::ports::{ChangeLogStore, SnapshotSource};
use crate::rules::RulesData;
use crate::{log_op_end, log_op_error, log_op_start};

const ENGINE: &str = "engine";

fn default_parallel() -> bool {
    true
}

/// Engine options, loadable from the `[engine]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Run detectors on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Detector names to skip
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            disabled: Vec::new(),
        }
    }
}

/// Output of one detector behind the isolation boundary.
struct DetectorRun {
    changes: Vec<Change>,
    diagnostics: Diagnostics,
    failure: Option<DetectorFailure>,
}

pub struct DetectionEngine {
    detectors: Vec<Box<dyn ChangeDetector>>,
    analyzer: CausationAnalyzer,
    rules: Arc<RulesData>,
    config: EngineConfig,
}

impl Default for DetectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionEngine {
    /// Engine with every built-in detector and the built-in rules tables.
    pub fn new() -> Self {
        Self {
            detectors: default_detectors(),
            analyzer: CausationAnalyzer::new(),
            rules: RulesData::builtin(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rules(mut self, rules: Arc<RulesData>) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the registered detectors. Their order is the batch order.
    pub fn with_detectors(mut self, detectors: Vec<Box<dyn ChangeDetector>>) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn with_analyzer(mut self, analyzer: CausationAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Names of the detectors that will run, in registration order
    pub fn active_detectors(&self) -> Vec<&'static str> {
        self.enabled().iter().map(|d| d.name()).collect()
    }

    fn enabled(&self) -> Vec<&dyn ChangeDetector> {
        self.detectors
            .iter()
            .map(|d| d.as_ref())
            .filter(|d| !self.config.disabled.iter().any(|n| n == d.name()))
            .collect()
    }

    /// Compare two snapshots of the same subject.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSnapshot` when either snapshot is not a JSON object.
    /// Nothing else is fatal: detector failures are recorded in the result.
    pub fn detect(
        &self,
        old: &Value,
        new: &Value,
        ctx: &DetectionContext,
    ) -> Result<DetectionResult, ExError> {
        let start = Instant::now();
        log_op_start!(
            "detect",
            run_id = %ctx.run_id,
            subject_id = %ctx.subject_id,
            detector_count = self.detectors.len()
        );

        if let Err(err) = check_snapshot("old", old).and_then(|_| check_snapshot("new", new)) {
            let err = ExError::from(err).with_op("detect");
            log_op_error!(
                "detect",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                run_id = %ctx.run_id
            );
            return Err(err);
        }

        let mut diagnostics = Diagnostics::new();
        for name in &self.config.disabled {
            if !self.detectors.iter().any(|d| d.name() == name) {
                diagnostics.record(ENGINE, "", format!("disabled detector '{name}' is not registered"));
            }
        }
        let old_sheet = CharacterSheet::extract(old, &self.rules, &mut diagnostics);
        let new_sheet = CharacterSheet::extract(new, &self.rules, &mut diagnostics);

        let enabled = self.enabled();
        let run_one = |detector: &&dyn ChangeDetector| {
            run_isolated(*detector, &old_sheet, &new_sheet, ctx, &self.rules)
        };
        // both branches collect in registration order
        let runs: Vec<DetectorRun> = if self.config.parallel {
            enabled.par_iter().map(run_one).collect()
        } else {
            enabled.iter().map(run_one).collect()
        };

        let mut batches = Vec::with_capacity(runs.len());
        let mut detector_failures = Vec::new();
        for run in runs {
            diagnostics.extend(run.diagnostics);
            detector_failures.extend(run.failure);
            batches.push(run.changes);
        }

        let mut changes = aggregate(batches, &mut diagnostics);
        let report = self
            .analyzer
            .analyze(&mut changes, &old_sheet, &new_sheet, &self.rules, &mut diagnostics);

        let result = DetectionResult {
            subject_id: ctx.subject_id.clone(),
            run_id: ctx.run_id.clone(),
            changes,
            attributions: report.attributions,
            causations: report.causations,
            diagnostics: diagnostics.into_vec(),
            detector_failures,
        };

        log_op_end!(
            "detect",
            duration_ms = start.elapsed().as_millis() as u64,
            run_id = %ctx.run_id,
            change_count = result.changes.len(),
            diagnostic_count = result.diagnostics.len(),
            failure_count = result.detector_failures.len()
        );
        Ok(result)
    }

    /// Fetch a snapshot pair, detect, and hand the result to the store.
    ///
    /// # Errors
    ///
    /// Propagates source and store errors, and `InvalidSnapshot` from
    /// [`detect`](Self::detect).
    pub fn detect_and_record(
        &self,
        source: &dyn SnapshotSource,
        subject_id: &str,
        store: &mut dyn ChangeLogStore,
    ) -> Result<DetectionResult, ExError> {
        let pair = source.snapshot_pair(subject_id)?;
        let ctx = DetectionContext::from_snapshots(&pair.old, &pair.new, pair.refs);
        let result = self.detect(&pair.old, &pair.new, &ctx)?;
        store.append(&result)?;
        Ok(result)
    }
}

fn check_snapshot(side: &str, snapshot: &Value) -> crate::errors::Result<()> {
    if snapshot.is_object() {
        return Ok(());
    }
    let found = match snapshot {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    Err(SheetDiffError::SnapshotNotObject {
        side: side.to_string(),
        found: found.to_string(),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "detector panicked".to_string()
    }
}

/// Run one detector. Errors and panics become a [`DetectorFailure`] and an
/// empty change list.
fn run_isolated(
    detector: &dyn ChangeDetector,
    old: &CharacterSheet,
    new: &CharacterSheet,
    ctx: &DetectionContext,
    rules: &RulesData,
) -> DetectorRun {
    let start = Instant::now();
    let name = detector.name();
    let mut diagnostics = Diagnostics::new();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        detector.detect(old, new, ctx, rules, &mut diagnostics)
    }));
    let err = match outcome {
        Ok(Ok(changes)) => {
            return DetectorRun {
                changes,
                diagnostics,
                failure: None,
            }
        }
        Ok(Err(err)) => err.with_detector(name),
        Err(payload) => ExError::new(ExErrorKind::DetectorFailed)
            .with_op("detect")
            .with_detector(name)
            .with_message(panic_message(payload.as_ref())),
    };
    log_op_error!(
        "run_detector",
        err.clone(),
        duration_ms = start.elapsed().as_millis() as u64,
        run_id = %ctx.run_id,
        detector = name
    );
    DetectorRun {
        changes: Vec::new(),
        diagnostics,
        failure: Some(DetectorFailure {
            detector: name.to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        }),
    }
}
