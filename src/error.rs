use std::{error::Error as StdError, fmt, io, path::PathBuf};

use crate::backend::SnapshotKind;
use crate::plugin::PluginApiVersion;

/// The different kinds of error that can occur in this library.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ErrorKind {
    /// The named snapper configuration does not exist.
    ConfigNotFound(String),
    /// The snapshot backend could not be reached at all (for example the `snapper` program is
    /// missing).
    BackendUnavailable(String),
    /// The backend failed to create a snapshot.
    CreateSnapshot(SnapshotKind),
    /// The backend answered with something we could not understand.
    UnexpectedBackendOutput(String),
    /// A userdata entry contains a separator the backend cannot escape.
    InvalidUserdata(String),
    /// A configuration file could not be parsed.
    ConfigSyntax {
        line: usize,
    },
    /// A transaction plan file was invalid.
    InvalidTransactionPlan(PathBuf),
    /// The host speaks a plugin API we do not support.
    IncompatibleApiVersion {
        required: PluginApiVersion,
        found: PluginApiVersion,
    },
    /// There was an unexpected i/o error
    UnexpectedIo,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::ConfigNotFound(name) => write!(f, "snapper config \"{}\" not found", name),
            ErrorKind::BackendUnavailable(reason) => write!(f, "the snapshot backend is unavailable: {}", reason),
            ErrorKind::CreateSnapshot(kind) => write!(f, "could not create {} snapshot", kind),
            ErrorKind::UnexpectedBackendOutput(output) => write!(f, "unexpected output from the snapshot backend: \"{}\"", output),
            ErrorKind::InvalidUserdata(entry) => write!(f, "userdata entry \"{}\" cannot be passed to snapper", entry),
            ErrorKind::ConfigSyntax { line } => write!(f, "syntax error in configuration at line {}", line),
            ErrorKind::InvalidTransactionPlan(path) => write!(f, "the transaction plan at \"{}\" is invalid", path.display()),
            ErrorKind::IncompatibleApiVersion { required, found } => write!(f, "plugin requires API version {}, host provides {}", required, found),
            ErrorKind::UnexpectedIo => write!(f, "there was an unexpected i/o error"),
        }
    }
}

/// The main error type for this library.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    inner: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    #[inline]
    fn from_parts(
        kind: ErrorKind,
        inner: Option<impl Into<Box<dyn StdError + Send + Sync + 'static>>>,
    ) -> Self {
        Error {
            kind,
            inner: inner.map(Into::into),
        }
    }

    pub fn config_not_found(name: impl Into<String>) -> Self {
        ErrorKind::ConfigNotFound(name.into()).into()
    }

    pub fn create_snapshot(
        kind: SnapshotKind,
        err: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self::from_parts(ErrorKind::CreateSnapshot(kind), Some(err))
    }

    /// The kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Add in a source
    pub fn with_source(
        mut self,
        inner: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        self.inner = Some(inner.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .as_ref()
            .map(|i| &**i as &(dyn StdError + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error { kind, inner: None }
    }
}

impl From<io::Error> for Error {
    fn from(cause: io::Error) -> Self {
        Error::from_parts(ErrorKind::UnexpectedIo, Some(cause))
    }
}

/// Helper trait to help working with `Result<T, Error>` where `Error` is our error.
pub trait ErrorContext<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    /// Takes any result and makes wraps the error in the given context.
    fn context(self, context: ErrorKind) -> Result<T, Error>;
    /// Takes any result and makes wraps the error in the context given by the function.
    fn with_context<F>(self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&E) -> ErrorKind;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context(self, context: ErrorKind) -> Result<T, Error> {
        self.map_err(|err| Error {
            kind: context,
            inner: Some(Box::new(err)),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&E) -> ErrorKind,
    {
        self.map_err(|err| {
            let kind = f(&err);
            Error {
                kind,
                inner: Some(Box::new(err)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_source() {
        let res: Result<(), io::Error> = Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        let err = res
            .context(ErrorKind::CreateSnapshot(SnapshotKind::Pre))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::CreateSnapshot(SnapshotKind::Pre));
        assert_eq!(err.to_string(), "could not create pre snapshot");
        assert_eq!(err.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn display() {
        let err = Error::config_not_found("root");
        assert_eq!(err.to_string(), r#"snapper config "root" not found"#);
        assert!(err.source().is_none());
    }
}
