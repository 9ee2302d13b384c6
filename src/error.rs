//! Error types for audiox

use thiserror::Error;

/// Result type alias for audiox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for audiox
#[derive(Error, Debug)]
pub enum Error {
    /// Backing storage reported failure; propagated verbatim
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Magic-byte mismatch or impossible header field
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// A read returned fewer bytes than required
    #[error("Truncated input: {0}")]
    TruncatedInput(String),

    /// Format detection returned nothing, or an output format is not registered
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Operation on a track id not produced by the demuxer / not added to the muxer
    #[error("Unknown track: {0}")]
    UnknownTrack(u32),

    /// Seek attempted on a stream source, or reposition on a forward-only writer
    #[error("Not seekable: {0}")]
    NonSeekable(String),

    /// Packet written after finalize, or finalize called twice
    #[error("Muxer state error: {0}")]
    MuxerState(String),

    /// Bit-stream decoding ran off the end of a valid code length
    #[error("Invalid code: {0}")]
    InvalidCode(String),
}

impl Error {
    /// Create an invalid-container error
    pub fn invalid_container<S: Into<String>>(msg: S) -> Self {
        Error::InvalidContainer(msg.into())
    }

    /// Create a truncated-input error
    pub fn truncated<S: Into<String>>(msg: S) -> Self {
        Error::TruncatedInput(msg.into())
    }

    /// Create an unsupported-format error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::UnsupportedFormat(msg.into())
    }

    /// Create a non-seekable error
    pub fn non_seekable<S: Into<String>>(msg: S) -> Self {
        Error::NonSeekable(msg.into())
    }

    /// Create a muxer-state error
    pub fn muxer_state<S: Into<String>>(msg: S) -> Self {
        Error::MuxerState(msg.into())
    }

    /// Create an invalid-code error
    pub fn invalid_code<S: Into<String>>(msg: S) -> Self {
        Error::InvalidCode(msg.into())
    }
}
