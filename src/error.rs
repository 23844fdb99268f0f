//! Error types for sql-index-advisor

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to collaborators around the advisory engine
#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Failed to connect to SQL Server at {host}: {message}")]
    ConnectionError { host: String, message: String },

    #[error("Metadata query failed in database {database}: {message}")]
    MetadataQueryError { database: String, message: String },

    #[error("Statement failed in database {database}: {message}\n{statement}")]
    StatementError {
        database: String,
        statement: String,
        message: String,
    },

    #[error("Failed to read SQL file: {path}")]
    SqlFileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact to {path}")]
    ArtifactWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Text generation failed: {message}")]
    GenerationError { message: String },

    #[error("Could not find a procedure name in: {snippet}")]
    ProcedureNameNotFound { snippet: String },

    #[error("Procedure not found: {database}.{schema}.{name}")]
    ProcedureNotFound {
        database: String,
        schema: String,
        name: String,
    },
}

impl AdvisorError {
    /// True when the server reported that the target object is missing.
    ///
    /// Matches SQL Server error 3701 ("Cannot drop the procedure ... because it
    /// does not exist") and the generic "does not exist" wording.
    pub fn is_missing_object(&self) -> bool {
        match self {
            AdvisorError::StatementError { message, .. } => {
                message.contains("3701") || crate::util::contains_ci(message, "does not exist")
            }
            _ => false,
        }
    }
}
