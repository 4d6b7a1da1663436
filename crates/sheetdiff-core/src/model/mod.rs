//! Detection output types.
//!
//! All types implement `Debug, Clone, Serialize, Deserialize, PartialEq`.
//! Maps use `BTreeMap` for deterministic serialization.

pub mod change;
pub mod context;
pub mod diagnostics;
pub mod metadata;
pub mod result;

pub use change::{
    Change, ChangeAttribution, ChangeCategory, ChangeCausation, ChangePriority, ChangeType,
};
pub use context::{ComparisonRefs, DetectionContext};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use result::{DetectionResult, DetectorFailure};
