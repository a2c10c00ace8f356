use thiserror::Error;

/// Failures outside the core transforms, which are total.
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("failed to read input {path}: {source}")]
    ReadInput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse input {path}: {source}")]
    ParseInput {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("input {path} is neither a record array nor an object with an events/incidents array")]
    UnrecognizedInput { path: String },
}
