//! Error types for frontend access and discovery.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a single frontend device.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The frontend character device could not be opened.
    #[error("Failed to open frontend {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An ioctl on an open frontend failed.
    #[error("{query} failed: {source}")]
    Query {
        query: &'static str,
        #[source]
        source: io::Error,
    },

    /// Closing the frontend failed.
    #[error("Failed to close frontend: {0}")]
    Close(#[source] io::Error),

    /// The platform has no DVB frontend API.
    #[error("DVB frontend access is not supported on this platform (supported: Linux)")]
    Unsupported,
}

impl DeviceError {
    pub(crate) fn query(query: &'static str, source: impl Into<io::Error>) -> Self {
        DeviceError::Query {
            query,
            source: source.into(),
        }
    }
}

/// Errors that make frontend discovery unusable as a whole.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The DVB root directory could not be listed.
    #[error("Failed to read {} directory: {source}", path.display())]
    ReadRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Nothing usable was found.
    #[error("There are no usable frontends in {} directory", .0.display())]
    NoDevices(PathBuf),
}
