//! Errors surfaced by environment operations

use std::path::PathBuf;

use gymlink_protocol::CodecError;
use gymlink_utils::GymError;

/// Error returned by [`crate::Env`] methods
///
/// Failures inside an operation are wrapped in [`EnvError::Operation`] with
/// the operation's name; [`EnvError::root`] recovers the underlying kind.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Address resolution or dialing failed
    #[error(transparent)]
    Connect(#[from] GymError),

    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Non-empty error field returned by the server
    #[error("{0}")]
    Remote(String),

    #[error("Malformed space: {0}")]
    MalformedSpace(#[source] serde_json::Error),

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Connection unusable after an earlier framing error")]
    ConnectionUnusable,

    #[error("{op}: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: Box<EnvError>,
    },
}

impl EnvError {
    /// Annotate the error with the operation it interrupted
    pub fn context(self, op: &'static str) -> Self {
        Self::Operation {
            op,
            source: Box::new(self),
        }
    }

    /// The underlying error, with operation context stripped
    pub fn root(&self) -> &EnvError {
        let mut err = self;
        while let Self::Operation { source, .. } = err {
            err = source.as_ref();
        }
        err
    }

    /// Name of the outermost operation, if any
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Operation { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Message sent by the server, for remote and handshake failures
    pub fn remote_message(&self) -> Option<&str> {
        match self.root() {
            Self::Remote(msg) | Self::HandshakeRejected(msg) => Some(msg),
            _ => None,
        }
    }

    /// Whether the error left the stream at an unknown position
    pub fn breaks_framing(&self) -> bool {
        match self.root() {
            Self::Io(_) => true,
            Self::Codec(err) => err.breaks_framing(),
            _ => false,
        }
    }

    /// Whether the connection should be abandoned after this error
    pub fn is_fatal(&self) -> bool {
        self.breaks_framing() || matches!(self.root(), Self::ConnectionUnusable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let err = EnvError::Remote("unknown wrapper: Foo".into()).context("wrap Retro environment");
        assert_eq!(err.to_string(), "wrap Retro environment: unknown wrapper: Foo");
        assert_eq!(err.operation(), Some("wrap Retro environment"));
    }

    #[test]
    fn test_root_strips_context() {
        let err = EnvError::HandshakeRejected("no such env".into()).context("make environment");
        assert!(matches!(err.root(), EnvError::HandshakeRejected(_)));
        assert_eq!(err.remote_message(), Some("no such env"));
    }

    #[test]
    fn test_codec_kind_preserved() {
        let err = EnvError::from(CodecError::InvalidBoolean(2)).context("step environment");
        assert!(matches!(
            err.root(),
            EnvError::Codec(CodecError::InvalidBoolean(2))
        ));
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Invalid bool: 2"));
    }

    #[test]
    fn test_framing_errors_are_fatal() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(EnvError::from(CodecError::Io(eof)).context("reset environment").is_fatal());
        assert!(EnvError::from(CodecError::UnsupportedActionType(4)).is_fatal());
        assert!(EnvError::ConnectionUnusable.is_fatal());
        assert!(!EnvError::Remote("bad".into()).is_fatal());
    }

    #[test]
    fn test_remote_message_absent_for_local_errors() {
        let err = EnvError::ConnectionUnusable.context("render environment");
        assert_eq!(err.remote_message(), None);
    }
}
