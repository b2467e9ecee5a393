//! Error types for the station registry

/// Result type alias for station registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using a station list
///
/// Only index access, persistence and the stream codec can fail; the
/// in-memory operations (`append`, `remove`, `find`, `sort`) never do.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Index access outside `0..count`
    #[error("Station index {index} out of range (count is {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// The settings store could not be opened
    #[error("Settings store unavailable: {0}")]
    StoreUnavailable(String),

    /// Reading a key from the store failed
    #[error("Failed to read '{key}' from settings store")]
    StoreRead {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Writing or deleting a key in the store failed
    #[error("Failed to write '{key}' to settings store")]
    StoreWrite {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A persisted record is not a pair of strings
    #[error("Malformed station record #{index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    /// Invalid data in a binary station stream
    #[error("Station stream error: {0}")]
    Codec(String),

    /// IO error while reading or writing a station stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn store_read(path: &[&str], source: anyhow::Error) -> Self {
        Self::StoreRead {
            key: path.join("/"),
            source,
        }
    }

    pub(crate) fn store_write(path: &[&str], source: anyhow::Error) -> Self {
        Self::StoreWrite {
            key: path.join("/"),
            source,
        }
    }

    pub(crate) fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }
}
