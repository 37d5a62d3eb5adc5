//! Errors surfaced by the build engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A `.prereqs` record exists but neither a target-specific nor a default
    /// do script was found; the target cannot be (re)built.
    #[error("{0} has a .prereqs record but no do script")]
    MissingRecipe(String),

    #[error("cannot make a node of {0:?}")]
    BadPath(String),

    #[error("unknown dependency type {verb:?} in prereqs line {line:?}")]
    UnknownDepKind { line: String, verb: String },

    #[error("malformed prereqs line {0:?}")]
    BadRecord(String),

    #[error("cannot parse REDOTREETIME {0:?}")]
    BadTreeTime(String),

    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// An artifact's current content disagrees with its record: it was
    /// modified outside the build system, and we refuse to overwrite that.
    #[error("{0}: hash changed since last build")]
    HashDrift(String),

    #[error("{target}: do script {reason}")]
    RecipeFailed { target: String, reason: String },

    #[error("{0}: do script wrote to both stdout and $3")]
    DoubleWrite(String),

    #[error("dependency cycle: {0}")]
    Cycle(String),

    #[error("build cancelled: {0}")]
    Cancelled(String),

    #[error("{0}")]
    Usage(String),
}

impl Error {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Error {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
