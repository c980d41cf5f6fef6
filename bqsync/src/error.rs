//! Error types and result definitions for change propagation.
//!
//! Every failure in the engine is reported as a [`SyncError`] carrying an [`ErrorKind`], a static
//! description, optional dynamic detail and source, and the location where it was raised. Errors
//! are never retried or skipped inside the engine: they travel up to the single top-level handler
//! of the process, which halts replication so the last acknowledged position stays the safe
//! resume point.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for operations failing with [`SyncError`].
pub type SyncResult<T> = Result<T, SyncError>;

/// Payload of a [`SyncError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the engine.
///
/// Two errors compare equal when their kinds are equal, which keeps assertions in tests focused
/// on the failure category instead of call sites or messages.
#[derive(Debug, Clone)]
pub struct SyncError {
    payload: Box<ErrorPayload>,
}

/// Categories of failures.
///
/// The categories are grouped by the taxonomy the engine reports to operators: configuration
/// problems, undecodable values, transport failures towards the warehouse or the lookup database,
/// and partially rejected batches.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    ConfigError,
    InvalidTablePattern,
    RuleNotFound,

    // Schema Errors
    MissingTableSchema,
    MissingPrimaryKey,

    // Data & Transformation Errors
    UnsupportedColumnType,
    ValueDecodingError,
    InvalidData,

    // Source Errors
    SourceProtocolError,
    SourceIoError,

    // Lookup Errors
    LookupConnectionFailed,
    LookupQueryFailed,

    // Destination Errors
    AuthenticationError,
    DestinationConnectionFailed,
    DestinationQueryFailed,
    DestinationError,
    PartialBatchFailure,

    // IO & Serialization Errors
    IoError,
    SerializationError,
    DeserializationError,

    // General Errors
    InvalidState,
}

impl ErrorKind {
    /// Returns `true` for the kinds reported as configuration errors.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConfigError | ErrorKind::InvalidTablePattern | ErrorKind::RuleNotFound
        )
    }

    /// Returns `true` for failures of the warehouse or lookup transports.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::LookupConnectionFailed
                | ErrorKind::LookupQueryFailed
                | ErrorKind::AuthenticationError
                | ErrorKind::DestinationConnectionFailed
                | ErrorKind::DestinationQueryFailed
                | ErrorKind::DestinationError
        )
    }
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let payload = &self.payload;
        let location = payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            payload.kind,
            payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        if let Some(detail) = payload.detail.as_deref() {
            if detail.trim().is_empty() {
                write!(f, "\n  Detail: <empty>")?;
            } else {
                write!(f, "\n  Detail:")?;
                for line in detail.lines() {
                    write!(f, "\n    {line}")?;
                }
            }
        }

        let rendered_backtrace = format!("{}", payload.backtrace);
        if !rendered_backtrace.trim().is_empty() && f.alternate() {
            write!(f, "\n  Backtrace:")?;
            for line in rendered_backtrace.lines() {
                write!(f, "\n    {line}")?;
            }
        }

        Ok(())
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Creates a [`SyncError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SyncError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`SyncError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for SyncError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] to [`SyncError`].
///
/// Syntax and data errors are [`ErrorKind::DeserializationError`]; I/O failures keep
/// [`ErrorKind::IoError`].
impl From<serde_json::Error> for SyncError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`regex::Error`] to [`SyncError`] with [`ErrorKind::InvalidTablePattern`].
impl From<regex::Error> for SyncError {
    #[track_caller]
    fn from(err: regex::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::InvalidTablePattern,
            Cow::Borrowed("Table pattern is not a valid regular expression"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`sqlx::Error`] to [`SyncError`].
///
/// Pool and I/O failures are [`ErrorKind::LookupConnectionFailed`]; everything else is a failed
/// lookup query.
#[cfg(feature = "mysql")]
impl From<sqlx::Error> for SyncError {
    #[track_caller]
    fn from(err: sqlx::Error) -> SyncError {
        let (kind, description) = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => (
                ErrorKind::LookupConnectionFailed,
                "Lookup database connection failed",
            ),
            _ => (ErrorKind::LookupQueryFailed, "Lookup query failed"),
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_error;

    #[test]
    fn errors_compare_by_kind() {
        let a = sync_error!(ErrorKind::RuleNotFound, "No rule", "orders");
        let b = sync_error!(ErrorKind::RuleNotFound, "Other description");
        let c = sync_error!(ErrorKind::ConfigError, "No rule");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.detail(), Some("orders"));
    }

    #[test]
    fn display_includes_description_and_detail() {
        let err = sync_error!(
            ErrorKind::ValueDecodingError,
            "Enum index out of range",
            "column `status`: index 9"
        );
        let rendered = err.to_string();

        assert!(rendered.starts_with("[ValueDecodingError] Enum index out of range @ "));
        assert!(rendered.contains("column `status`: index 9"));
    }

    #[test]
    fn classifies_kinds_into_the_reported_taxonomy() {
        assert!(ErrorKind::RuleNotFound.is_configuration_error());
        assert!(ErrorKind::InvalidTablePattern.is_configuration_error());
        assert!(!ErrorKind::PartialBatchFailure.is_configuration_error());
        assert!(ErrorKind::DestinationQueryFailed.is_transport_error());
        assert!(!ErrorKind::UnsupportedColumnType.is_transport_error());
    }
}
