//! Core types shared across sheetdiff facilities
//!
//! This crate provides foundational types used by both the error and
//! logging facilities of the detection engine:
//!
//! - **Correlation types**: RunId for tying every log event of one
//!   comparison run together
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::RunId;
