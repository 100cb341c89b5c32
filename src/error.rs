//! Compilation errors. Every variant is fatal: a run that hits one produces no output.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The grammar rejected the source text.
    #[error("Syntax: {0}")]
    Syntax(String),
    /// A bitstruct does not describe exactly one 64-bit record.
    #[error("Layout of `{bitstruct}`: {reason}")]
    Layout { bitstruct: String, reason: String },
    /// A log template is malformed or uses an unknown format spec.
    #[error("Log format: {0}")]
    Format(String),
    /// A model node carries more than one statement.
    #[error("Structural: {0}")]
    Structural(String),
    /// A construct that parses but has no defined lowering.
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Unknown name `{name}` in `{bitstruct}`")]
    UnknownName { bitstruct: String, name: String },
    #[error("Type: {0}")]
    Type(String),
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },
    #[error("IO on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CompileError>;
