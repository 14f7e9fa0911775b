use std::path::PathBuf;

use thiserror::Error;

use crate::jsonpath::PathError;

/// Failure of a single step. Every variant aborts the step; the runner marks
/// the scenario failed and skips whatever steps remain.
#[derive(Debug, Error)]
pub enum StepError {
    /// An assertion ran before any request was sent in this scenario.
    #[error("no response captured yet: send a request before checking it")]
    NoResponse,

    /// DNS, connection or timeout failure while sending.
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body: {0}")]
    BodyRead(#[source] reqwest::Error),

    /// Method, URL or header could not be turned into a request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("response body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("expected document is not valid JSON: {0}")]
    InvalidExpectedJson(#[source] serde_json::Error),

    #[error("json path {expr}: {source}")]
    JsonPath {
        expr: String,
        #[source]
        source: PathError,
    },

    #[error("invalid regex: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The expected text cannot be read as the type of the actual value.
    #[error("cannot parse expected value {expected:?} as {kind}")]
    ExpectedValue { expected: String, kind: &'static str },

    /// An `API_STEPS_*` variable holds something that cannot be used.
    #[error("invalid value {value:?} for {var}")]
    InvalidConfig { var: &'static str, value: String },

    #[error("invalid data table: {0}")]
    InvalidTable(String),

    /// Well-formed data that does not meet the expectation.
    #[error("{0}")]
    Mismatch(String),

    #[error("JSON schema file does not exist: {}", .0.display())]
    SchemaNotFound(PathBuf),

    #[error("cannot open json schema file {}: {source}", .path.display())]
    SchemaRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json schema {} is not usable: {message}", .path.display())]
    InvalidSchema { path: PathBuf, message: String },

    #[error(
        "the response is not valid according to the specified schema {schema}:\n  {}",
        .violations.join("\n  ")
    )]
    SchemaViolations {
        schema: String,
        violations: Vec<String>,
    },

    #[error("cannot open upload file {}: {source}", .path.display())]
    UploadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StepError {
    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        StepError::Mismatch(message.into())
    }
}

pub type Result<T> = std::result::Result<T, StepError>;
