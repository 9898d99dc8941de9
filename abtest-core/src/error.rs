use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Insufficient variants: expected 2 distinct labels, found {found}")]
    InsufficientVariants { found: usize },

    #[error("Ambiguous variants: found {found} distinct labels; designate control and treatment explicitly")]
    AmbiguousVariants { found: usize },

    #[error("Empty arm: variant '{0}' has no non-null metric observations")]
    EmptyArm(String),

    #[error("Insufficient observations in variant '{variant}': found {found}, need at least {required}")]
    InsufficientObservations {
        variant: String,
        found: usize,
        required: usize,
    },

    #[error("Degenerate SRM check: {0}")]
    DegenerateSrm(String),

    #[error("Numeric instability: {0}")]
    NumericInstability(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(err: validator::ValidationErrors) -> Self {
        CoreError::Configuration(err.to_string())
    }
}
