use thiserror::Error;

/// Library error type for mind-movie operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The photo source could not produce an image list.
    #[error("photo source unavailable: {0}")]
    Source(String),

    /// A source reference uses a scheme the resolver does not handle.
    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),

    /// A `data:` URI that is not base64 image data.
    #[error("malformed data uri: {0}")]
    InvalidDataUri(String),

    /// The encoded image exceeds the configured size limit.
    #[error("image source is {size} bytes, limit is {limit}")]
    SourceTooLarge { size: u64, limit: u64 },

    /// The bytes are not a decodable image.
    #[error(transparent)]
    Decode(#[from] image::ImageError),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed photo manifest.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
