// src/error.rs
//! Error types shared by the collectors and the exposition layer.

use std::io;

use thiserror::Error;

/// Failure to build a collector from its configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("'{0}' does not exist")]
    NotFound(String),

    #[error("'{0}' is a directory")]
    IsDirectory(String),

    #[error("'{0}' is not executable")]
    NotExecutable(String),

    #[error("could not initialize '{subsystem}' collector: {source}")]
    Collector {
        subsystem: &'static str,
        #[source]
        source: Box<SetupError>,
    },
}

impl SetupError {
    /// Wraps a path check failure with the subsystem that could not start.
    pub fn for_collector(subsystem: &'static str, source: SetupError) -> Self {
        SetupError::Collector {
            subsystem,
            source: Box::new(source),
        }
    }
}

/// An expected pattern was not found in otherwise readable tool output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("could not find {0} in command output")]
    MissingField(&'static str),

    #[error("could not parse {field} value '{value}' as an unsigned integer")]
    InvalidNumber { field: &'static str, value: String },
}

/// Failure of a single scrape cycle of one collector.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("could not execute '{command}': {reason}")]
    Execution { command: String, reason: String },

    #[error("could not decode {tool} output: {reason}")]
    Decode { tool: &'static str, reason: String },

    #[error("{tool} parser error: {source}")]
    Parse {
        tool: &'static str,
        #[source]
        source: ParseError,
    },

    #[error("could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Failure while turning collected metrics into the text exposition format.
#[derive(Debug, Error)]
pub enum ExpositionError {
    #[error("metric '{name}' expects {expected} label values, got {actual}")]
    LabelMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),

    #[error("exposition output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
