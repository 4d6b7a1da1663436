//! Snapshot file loading

use serde_json::Value;
use sheetdiff_core::{ComparisonRefs, DetectionContext, SheetDiffError};
use std::path::Path;

/// Read and parse one JSON snapshot file.
pub fn read_snapshot(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path).map_err(|e| SheetDiffError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|e| SheetDiffError::Serialization {
        message: format!("{}: {}", path.display(), e),
    })?;
    Ok(value)
}

/// Context for a file-based comparison; the file paths become the refs.
pub fn context_for(old_path: &Path, new_path: &Path, old: &Value, new: &Value) -> DetectionContext {
    DetectionContext::from_snapshots(
        old,
        new,
        ComparisonRefs {
            old_ref: Some(old_path.display().to_string()),
            new_ref: Some(new_path.display().to_string()),
        },
    )
}
