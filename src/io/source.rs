//! Abstract byte endpoints for reading and writing
//!
//! A [`Source`] names where bytes come from; a [`Target`] names where they
//! go. Neither performs I/O on its own: the [`Reader`](super::Reader) and
//! [`Writer`](super::Writer) open them lazily on first use.

use bytes::Bytes;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Where input bytes come from
///
/// Random access is guaranteed for `Buffer`, `File`, and `Url`; `Stream`
/// is read-once and rejects seeking.
pub enum Source {
    /// In-memory bytes
    Buffer(Bytes),
    /// Local file, opened on first read
    File(PathBuf),
    /// Remote resource fetched via HTTP `Range` requests
    Url {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// Forward-only byte stream
    Stream(Box<dyn Read + Send>),
}

impl Source {
    /// Create a source over in-memory bytes
    pub fn buffer(data: impl Into<Bytes>) -> Self {
        Source::Buffer(data.into())
    }

    /// Create a source over a local file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Source::File(path.into())
    }

    /// Create a source over an HTTP(S) URL
    pub fn url(url: impl Into<String>) -> Self {
        Source::Url {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Create a URL source with extra request headers
    pub fn url_with_headers(url: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Source::Url {
            url: url.into(),
            headers,
        }
    }

    /// Create a source over a forward-only byte stream
    pub fn stream(inner: impl Read + Send + 'static) -> Self {
        Source::Stream(Box::new(inner))
    }

    /// Resolve a plain address string: `http://`/`https://` prefixes name
    /// a URL source, everything else a file path.
    pub fn from_address(address: &str) -> Self {
        if address.starts_with("http://") || address.starts_with("https://") {
            Source::url(address)
        } else {
            Source::file(address)
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Buffer(data) => write!(f, "Source::Buffer({} bytes)", data.len()),
            Source::File(path) => write!(f, "Source::File({})", path.display()),
            Source::Url { url, .. } => write!(f, "Source::Url({})", url),
            Source::Stream(_) => write!(f, "Source::Stream"),
        }
    }
}

/// Where output bytes go
pub enum Target {
    /// Collect into memory; the assembled bytes are returned on close
    Buffer,
    /// Local file, written when the writer is closed
    File(PathBuf),
    /// Writable byte stream; writes pass through as they arrive
    Stream(Box<dyn Write + Send>),
}

impl Target {
    /// Create a target collecting into memory
    pub fn buffer() -> Self {
        Target::Buffer
    }

    /// Create a target writing to a local file on close
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Target::File(path.into())
    }

    /// Create a target streaming through to a writer
    pub fn stream(inner: impl Write + Send + 'static) -> Self {
        Target::Stream(Box::new(inner))
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Buffer => write!(f, "Target::Buffer"),
            Target::File(path) => write!(f, "Target::File({})", path.display()),
            Target::Stream(_) => write!(f, "Target::Stream"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_resolution() {
        assert!(matches!(
            Source::from_address("http://example.com/a.mp3"),
            Source::Url { .. }
        ));
        assert!(matches!(
            Source::from_address("https://example.com/a.mp3"),
            Source::Url { .. }
        ));
        assert!(matches!(
            Source::from_address("/tmp/a.mp3"),
            Source::File(_)
        ));
        assert!(matches!(
            Source::from_address("relative/a.wav"),
            Source::File(_)
        ));
    }
}
