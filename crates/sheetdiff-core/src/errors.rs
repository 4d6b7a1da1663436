use thiserror::Error;

/// Result type alias using SheetDiffError
pub type Result<T> = std::result::Result<T, SheetDiffError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers, tests and log
/// consumers can match on without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Boundary
    /// A snapshot handed to the engine is not a JSON object
    InvalidSnapshot,
    InvalidInput,

    // Detection
    /// A detector returned an error or panicked; the batch continues without it
    DetectorFailed,
    /// A detector reached a state its inputs should have ruled out
    DetectorInvariant,

    // Reference data / configuration
    InvalidRules,
    InvalidConfig,
    UnknownAudience,

    // Integration/IO
    Io,
    Serialization,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidSnapshot => "ERR_INVALID_SNAPSHOT",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::DetectorFailed => "ERR_DETECTOR_FAILED",
            ExErrorKind::DetectorInvariant => "ERR_DETECTOR_INVARIANT",
            ExErrorKind::InvalidRules => "ERR_INVALID_RULES",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::UnknownAudience => "ERR_UNKNOWN_AUDIENCE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
        }
    }
}

/// Canonical structured error type
///
/// Carries a stable kind plus optional context about where in the detection
/// pipeline the failure happened.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    detector: Option<String>,
    field_path: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            detector: None,
            field_path: None,
            message: String::new(),
            source: None,
        }
    }

    /// Set the operation name
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Set the detector name
    pub fn with_detector(mut self, detector: impl Into<String>) -> Self {
        self.detector = Some(detector.into());
        self
    }

    /// Set the logical field path being processed
    pub fn with_field_path(mut self, field_path: impl Into<String>) -> Self {
        self.field_path = Some(field_path.into());
        self
    }

    /// Set the error message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn detector(&self) -> Option<&str> {
        self.detector.as_deref()
    }

    pub fn field_path(&self) -> Option<&str> {
        self.field_path.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(detector) = &self.detector {
            write!(f, " (detector: {})", detector)?;
        }
        if let Some(field_path) = &self.field_path {
            write!(f, " (field_path: {})", field_path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for sheetdiff operations outside the detector hot path
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SheetDiffError {
    /// Snapshot root is not a JSON object
    #[error("{side} snapshot must be a JSON object, got {found}")]
    SnapshotNotObject { side: String, found: String },

    /// Reference table failed to parse
    #[error("Reference table '{table}' is invalid: {message}")]
    InvalidRulesTable { table: String, message: String },

    /// Audience tag is not one of the supported audiences
    #[error("Unknown audience: {audience}")]
    UnknownAudience { audience: String },

    /// Configuration could not be parsed
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// A snapshot or configuration file could not be read
    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },
}

impl From<SheetDiffError> for ExError {
    fn from(err: SheetDiffError) -> Self {
        match &err {
            SheetDiffError::SnapshotNotObject { .. } => {
                ExError::new(ExErrorKind::InvalidSnapshot).with_message(err.to_string())
            }
            SheetDiffError::InvalidRulesTable { .. } => {
                ExError::new(ExErrorKind::InvalidRules).with_message(err.to_string())
            }
            SheetDiffError::UnknownAudience { .. } => {
                ExError::new(ExErrorKind::UnknownAudience).with_message(err.to_string())
            }
            SheetDiffError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::InvalidConfig).with_message(err.to_string())
            }
            SheetDiffError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
            }
            SheetDiffError::Io { .. } => ExError::new(ExErrorKind::Io).with_message(err.to_string()),
        }
    }
}

/// Conversion from serde_json::Error to SheetDiffError
impl From<serde_json::Error> for SheetDiffError {
    fn from(err: serde_json::Error) -> Self {
        SheetDiffError::Serialization {
            message: err.to_string(),
        }
    }
}
