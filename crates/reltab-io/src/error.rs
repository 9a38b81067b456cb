use thiserror::Error;

/// Result type local to reltab-io.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while encoding or decoding a segment. Callers of the public
/// save/load functions see these folded into `reltab_core::error::Error::Io`.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] reltab_core::error::Error),

    #[error("segment storage error: {0}")]
    Storage(String),

    #[error("truncated segment: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unsupported codec: {0}")]
    CodecUnsupported(&'static str),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<Error> for reltab_core::error::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Core(inner @ reltab_core::error::Error::Io(_)) => inner,
            other => reltab_core::error::Error::Io(other.to_string()),
        }
    }
}
