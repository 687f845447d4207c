use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while translating VM source into HACK
/// assembly. Every variant carries enough context (path, line, token) to
/// render on its own — the driver doesn't reconstruct anything after the
/// fact.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: unknown opcode '{token}'")]
    UnknownOpcode {
        path: PathBuf,
        line: usize,
        token: String,
    },

    #[error("{path}:{line}: malformed command: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{path}:{line}: {segment} is not a valid segment for {direction}")]
    BadSegment {
        path: PathBuf,
        line: usize,
        segment: String,
        direction: &'static str,
    },

    #[error(
        "'{basename}' is used by more than one input file; static symbols would collide"
    )]
    DuplicateUnit { basename: String },

    #[error("'{path}' is not a .vm file or a directory containing .vm files")]
    InvalidInput { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, TranslateError>;
