// error.rs — Generation error taxonomy
//
// Every generation-time failure is a `GenError`. Errors are raised
// synchronously and abort the artifact being generated; there is no recovery
// and no partial output.

use std::path::PathBuf;

use thiserror::Error;

use crate::direction::Offset;

#[derive(Debug, Error)]
pub enum GenError {
    /// A parameter required to be symbolic is a concrete value, or a kernel
    /// parameter list cannot be marshalled as declared.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An offset component has magnitude > 1.
    #[error("unsupported offset {offset}: only first-neighborhood stencils are supported")]
    UnsupportedOffset { offset: Offset },

    /// Participating fields disagree on their element type.
    #[error("fields of different data types are used - this is not supported\n{detail}")]
    MixedType { detail: String },

    #[error("no fields to pack")]
    EmptySpec,

    #[error("generator for {files:?} returned {got} artifacts, expected {expected}")]
    ArtifactCount {
        files: Vec<String>,
        expected: usize,
        got: usize,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The generation script produced error-level diagnostics.
    #[error("{count} error(s) in generation script")]
    Script { count: usize },
}

impl GenError {
    pub fn config(message: impl Into<String>) -> Self {
        GenError::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_offset_names_the_offset() {
        let e = GenError::UnsupportedOffset {
            offset: Offset::new(2, 0, -1),
        };
        assert_eq!(
            e.to_string(),
            "unsupported offset (2, 0, -1): only first-neighborhood stencils are supported"
        );
    }

    #[test]
    fn mixed_type_carries_detail() {
        let e = GenError::MixedType {
            detail: " - a [double]\n - b [float]".to_string(),
        };
        assert!(e.to_string().ends_with(" - a [double]\n - b [float]"));
    }
}
