//! Crate-wide error type.
//!
//! Configuration and I/O problems surface as `Error` values; violations of
//! simulator invariants (a photon outside the medium, a depth with no layer)
//! indicate a bug and abort via `panic!` instead of being recoverable.

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the simulation core.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid simulation geometry or driver parameters. Fatal at
    /// initialization.
    #[error("configuration error: {0}")]
    Config(String),

    /// A field frame file held the wrong number of cells for the bound grid.
    #[error("frame file '{path}': expected {expected} values, found {found}")]
    FrameSize {
        path: String,
        expected: usize,
        found: usize,
    },

    /// A field frame file held a token that does not parse as a double.
    #[error("frame file '{path}': {reason}")]
    FrameParse { path: String, reason: String },

    /// Propagated I/O errors from frame loading and the logger sinks.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let e = Error::Config("layers are not contiguous".to_string());
        assert!(format!("{e}").contains("layers are not contiguous"));
    }

    #[test]
    fn frame_size_error_display() {
        let e = Error::FrameSize {
            path: "pressure0.txt".to_string(),
            expected: 8,
            found: 7,
        };
        let msg = format!("{e}");
        assert!(msg.contains("pressure0.txt"));
        assert!(msg.contains('8'));
        assert!(msg.contains('7'));
    }
}
