//! Error types for renderers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Delimited output error: {0}")]
    Csv(#[from] csv::Error),

    /// The renderer does not offer a mode with this argument.
    #[error("Renderer '{renderer}' does not support argument '{argument}'")]
    UnsupportedArgument { renderer: String, argument: String },

    #[error("{0}")]
    Other(String),
}

impl RenderError {
    pub fn unsupported_argument(renderer: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::UnsupportedArgument {
            renderer: renderer.into(),
            argument: argument.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_argument_message() {
        let err = RenderError::unsupported_argument("delimited", "xlsx");
        let msg = err.to_string();
        assert!(msg.contains("delimited"));
        assert!(msg.contains("xlsx"));
    }

    #[test]
    fn test_io_from() {
        let err: RenderError = std::io::Error::other("closed").into();
        assert!(matches!(err, RenderError::Io(_)));
    }
}
