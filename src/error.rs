//! Error types for encoding and inference

use thiserror::Error;

/// Raised when a loan application cannot be turned into a feature row.
///
/// Encoding never produces a partial row: the first offending field aborts
/// the whole record so nothing reaches the classifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingError {
    #[error("unknown value {value:?} for categorical field `{field}`")]
    UnknownCategory { field: &'static str, value: String },

    #[error("cannot parse {value:?} in field `{field}` as a year and month")]
    InvalidDate { field: &'static str, value: String },

    #[error("value {value} is outside the domain of field `{field}`")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("text encoder for `{field}` failed: {reason}")]
    TextEncoder { field: &'static str, reason: String },
}

/// Raised when the classifier misbehaves on an encoded row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("classifier returned {len} labels with shape {shape:?}, expected a single scalar")]
    UnexpectedOutput { shape: Vec<usize>, len: usize },

    #[error("classifier expects {expected} features, row has {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },
}

/// Raised while loading the encoding schema or a text encoder artifact.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("lookup table `{0}` is empty")]
    EmptyTable(&'static str),

    #[error("lookup table `{table}` maps {key:?} to a non-finite code")]
    NonFiniteCode { table: &'static str, key: String },

    #[error("feature order is missing `{0}`")]
    MissingFeature(String),

    #[error("feature order contains unknown feature `{0}`")]
    UnknownFeature(String),

    #[error("feature order lists `{0}` more than once")]
    DuplicateFeature(String),
}

/// Failure of a single encode-then-predict evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PipelineError {
    /// Stage that failed, as reported to callers.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Encoding(_) => "encoding",
            PipelineError::Inference(_) => "inference",
        }
    }
}
