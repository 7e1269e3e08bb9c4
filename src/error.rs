use std::path::PathBuf;

use thiserror::Error;

/// Failures raised below the pipeline. Everything above wraps these in
/// `anyhow` with context.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("request to '{endpoint}' failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("'{endpoint}' answered with status {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },

    #[error("could not decode the response of '{endpoint}'")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("'{}' already exists and could not be removed", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid timestamp '{value}'")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("document archive error")]
    Archive(#[from] zip::result::ZipError),

    #[error("template '{part}': {message}")]
    Template { part: String, message: String },

    #[error("template engine, {stage}: {message}")]
    Engine {
        stage: &'static str,
        message: String,
    },
}
