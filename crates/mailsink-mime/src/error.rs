//! Decoding failures.

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a header value could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An encoded word that does not follow `=?charset?enc?text?=`.
    #[error("Malformed encoded word: {0}")]
    MalformedWord(String),

    /// Encoding letter other than `B` or `Q`.
    #[error("Unknown encoded-word encoding {0:?}")]
    UnknownEncoding(String),

    /// Bad `=XX` escape in the `Q` form.
    #[error("Bad Q escape at byte {0}")]
    BadEscape(usize),

    /// Payload of a `B` word.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// Decoded bytes are not valid in the declared UTF-8 charset.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}
