use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfToolsError {
    #[error("Unsupported operation: {0}")]
    UnknownOperation(String),

    #[error("{0}")]
    InvalidParameters(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse classification used by callers that report errors to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested tool does not exist
    Routing,
    /// The tool exists but was misused (wrong file count, bad parameters)
    Usage,
    /// The input content could not be processed
    Processing,
}

impl PdfToolsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PdfToolsError::UnknownOperation(_) => ErrorKind::Routing,
            PdfToolsError::InvalidParameters(_) => ErrorKind::Usage,
            _ => ErrorKind::Processing,
        }
    }

    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        PdfToolsError::InvalidParameters(msg.into())
    }
}

impl From<lopdf::Error> for PdfToolsError {
    fn from(err: lopdf::Error) -> Self {
        PdfToolsError::OperationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_separates_routing_from_usage() {
        assert_eq!(
            PdfToolsError::UnknownOperation("x".into()).kind(),
            ErrorKind::Routing
        );
        assert_eq!(PdfToolsError::usage("bad").kind(), ErrorKind::Usage);
        assert_eq!(
            PdfToolsError::ParseError("eof".into()).kind(),
            ErrorKind::Processing
        );
    }

    #[test]
    fn test_usage_message_is_verbatim() {
        let err = PdfToolsError::usage("Password is required");
        assert_eq!(err.to_string(), "Password is required");
    }
}
