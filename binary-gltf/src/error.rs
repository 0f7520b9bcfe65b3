//! Error type shared by every stage of a conversion.
//!
//! There is no partial-success mode: any of these aborts the conversion and
//! nothing is written.

use std::path::PathBuf;

use crate::image::SUPPORTED_MIME_TYPES;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Error type for scene conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Data URI does not match `data:[<mediatype>][;charset=<charset>][;base64],<data>`
    #[error("unsupported data URI: {0}")]
    UnsupportedDataUri(String),

    /// External resource could not be read
    #[error("failed to read resource {uri:?} ({}): {source}", .path.display())]
    ResourceRead {
        uri: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Buffer declares a storage type other than `arraybuffer`
    #[error("buffer type {buffer_type:?} not supported: {buffer_id}")]
    UnsupportedBufferType {
        buffer_id: String,
        buffer_type: String,
    },

    /// Buffer view references a buffer that is not declared
    #[error("buffer ID reference not found: {buffer_id} (referenced by buffer view {view_id})")]
    DanglingBufferReference { view_id: String, buffer_id: String },

    /// Requested image media type is not one of the supported formats
    #[error(
        "invalid MIME type {0:?}; supported MIME types are: {supported}",
        supported = SUPPORTED_MIME_TYPES.join(", ")
    )]
    UnsupportedMimeType(String),

    /// Image header does not match the requested media type
    #[error("invalid image for type: {0}")]
    InvalidImageForType(String),

    /// No supported image format matched the data
    #[error(
        "unrecognized image format; supported MIME types are: {supported}",
        supported = SUPPORTED_MIME_TYPES.join(", ")
    )]
    UnrecognizedImageFormat,

    /// Container lengths overflow the 32-bit header fields
    #[error("container too large: {0} bytes exceeds the 32-bit length field")]
    ContainerTooLarge(u64),

    /// Scene document is structurally unusable
    #[error("invalid scene document: {0}")]
    InvalidScene(String),

    /// Rewritten scene document failed to serialize
    #[error("failed to serialize scene document: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    pub(crate) fn invalid_scene(msg: impl Into<String>) -> Self {
        Self::InvalidScene(msg.into())
    }
}
