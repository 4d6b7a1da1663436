#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use sheetdiff_core::detectors::{default_detectors, ChangeDetector};
use sheetdiff_core::errors::{ExError, ExErrorKind, SheetDiffError};
use sheetdiff_core::extract::CharacterSheet;
use sheetdiff_core::logging_facility::test_capture::init_test_capture;
use sheetdiff_core::model::{Change, DetectionContext, Diagnostics};
use sheetdiff_core::rules::RulesData;
use sheetdiff_core::sheetdiff_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_CHANGE_COUNT, FIELD_COMPONENT, FIELD_DETECTOR,
    FIELD_DIAGNOSTIC_COUNT, FIELD_DURATION_MS, FIELD_ERR_CODE, FIELD_ERR_KIND, FIELD_FAILURE_COUNT,
    FIELD_RUN_ID, FIELD_SUBJECT_ID,
};
use sheetdiff_core::{log_op_end, log_op_error, log_op_start, DetectionEngine};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    let events = capture.events();
    let start_events: Vec<_> = events
        .iter()
        .filter(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START))
        .collect();

    assert!(
        !start_events.is_empty(),
        "Should have captured at least one start event"
    );
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let end_events = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END)
    });
    assert_eq!(end_events, 1, "Should have exactly one end event");

    let events = capture.events();
    let end_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name))
        .unwrap();
    assert_eq!(end_event.field(FIELD_DURATION_MS), Some("42"));
    assert!(end_event.field(FIELD_COMPONENT).is_some());
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = SheetDiffError::UnknownAudience {
        audience: "email".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let events = capture.events();
    let error_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have an error event");
    assert_eq!(error_event.field(FIELD_ERR_CODE), Some("ERR_UNKNOWN_AUDIENCE"));
    assert_eq!(error_event.field(FIELD_ERR_KIND), Some("UnknownAudience"));
}

#[test]
fn test_detect_emits_start_and_end() {
    let capture = init_test_capture();
    let ctx = DetectionContext::new("c-log-1", "Logger");
    let run_id = ctx.run_id.to_string();

    DetectionEngine::new()
        .detect(
            &json!({"character_info": {"level": 1}}),
            &json!({"character_info": {"level": 2}}),
            &ctx,
        )
        .unwrap();

    let ours = |event: &str| {
        capture.count_events(|e| {
            e.op.as_deref() == Some("detect")
                && e.event.as_deref() == Some(event)
                && e.field(FIELD_RUN_ID) == Some(run_id.as_str())
        })
    };
    assert_eq!(ours(EVENT_START), 1);
    assert_eq!(ours(EVENT_END), 1);

    let events = capture.events();
    let mine = |event: &str| {
        events
            .iter()
            .find(|e| e.event.as_deref() == Some(event) && e.field(FIELD_RUN_ID) == Some(run_id.as_str()))
            .unwrap()
    };
    assert_eq!(mine(EVENT_START).field(FIELD_SUBJECT_ID), Some("c-log-1"));
    let end = mine(EVENT_END);
    assert!(end.field(FIELD_CHANGE_COUNT).is_some());
    assert!(end.field(FIELD_DIAGNOSTIC_COUNT).is_some());
    assert_eq!(end.field(FIELD_FAILURE_COUNT), Some("0"));
    assert!(end.field(FIELD_DURATION_MS).is_some());
}

#[test]
fn test_invalid_snapshot_logs_error() {
    let capture = init_test_capture();
    let ctx = DetectionContext::new("c-log-2", "Logger");
    let run_id = ctx.run_id.to_string();

    let err = DetectionEngine::new()
        .detect(&json!("not a sheet"), &json!({}), &ctx)
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidSnapshot);

    let errors = capture.count_events(|e| {
        e.event.as_deref() == Some(EVENT_END_ERROR)
            && e.field(FIELD_RUN_ID) == Some(run_id.as_str())
            && e.field(FIELD_ERR_CODE) == Some("ERR_INVALID_SNAPSHOT")
    });
    assert_eq!(errors, 1);
}

struct Broken;

impl ChangeDetector for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn detect(
        &self,
        _old: &CharacterSheet,
        _new: &CharacterSheet,
        _ctx: &DetectionContext,
        _rules: &RulesData,
        _diag: &mut Diagnostics,
    ) -> Result<Vec<Change>, ExError> {
        Err(ExError::new(ExErrorKind::DetectorInvariant).with_message("impossible state"))
    }
}

#[test]
fn test_detector_failure_is_logged_and_isolated() {
    let capture = init_test_capture();
    let ctx = DetectionContext::new("c-log-3", "Logger");
    let run_id = ctx.run_id.to_string();

    let mut detectors = default_detectors();
    detectors.insert(0, Box::new(Broken));
    let result = DetectionEngine::new()
        .with_detectors(detectors)
        .detect(
            &json!({"character_info": {"level": 1}}),
            &json!({"character_info": {"level": 2}}),
            &ctx,
        )
        .unwrap();

    assert!(result.change("character_info.level").is_some());
    assert_eq!(result.detector_failures.len(), 1);
    assert_eq!(result.detector_failures[0].detector, "broken");

    let logged = capture.count_events(|e| {
        e.op.as_deref() == Some("run_detector")
            && e.event.as_deref() == Some(EVENT_END_ERROR)
            && e.field(FIELD_RUN_ID) == Some(run_id.as_str())
            && e.field(FIELD_DETECTOR) == Some("broken")
    });
    assert_eq!(logged, 1);
}
