//! Unified error types for ranger.
//!
//! Every crate in the workspace reports failures through this enum. The
//! display strings carry a stable SCREAMING prefix so log lines can be
//! grepped by failure class.

use tokio_rusqlite::rusqlite;

/// Unified error type for the ranger proxy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A network fetch could not complete (connect failure, timeout, body
    /// read error). Strategies recover by falling back to the cache where
    /// one exists.
    #[error("NETWORK_UNAVAILABLE: {0}")]
    NetworkUnavailable(String),

    /// The upstream answered with a non-success status. Treated by every
    /// strategy exactly like a transport failure: never stored, recovered
    /// by cache fallback or propagated.
    #[error("UPSTREAM_STATUS: {0}")]
    UpstreamStatus(u16),

    /// No cache entry found for the given slot. Only raised by the
    /// inspection surface; strategy-level misses are `Ok(None)` and feed
    /// the populate-on-demand path instead.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A precache asset failed during install. Fatal to activation: the
    /// new proxy version must not go live with a partial shell.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// A lifecycle transition was requested from the wrong state.
    #[error("LIFECYCLE: {0}")]
    Lifecycle(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Response body exceeded the configured size cap.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl Error {
    /// Whether this error came from the network side of a strategy (either
    /// the transport failed or the upstream refused). Fallback paths key
    /// off this rather than matching variants at every call site.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Error::NetworkUnavailable(_) | Error::UpstreamStatus(_))
    }
}
