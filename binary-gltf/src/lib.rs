//! Binary glTF packing
//!
//! Converts a glTF 1.0 scene with external buffers, shaders and images into a
//! single self-contained Binary glTF (`KHR_binary_glTF`) container:
//! - `uri`: resolves data URIs and relative paths to bytes
//! - `image`: reads PNG/JPEG/GIF/BMP dimensions from their headers
//! - `body`: accumulates payloads into the binary body
//! - `convert`: rewrites the scene to reference the body
//! - `container`: writes the 20-byte header, scene and body
//!
//! # Example
//!
//! ```no_run
//! use binary_gltf::{ConvertOptions, EmbedSet, convert};
//! use std::path::Path;
//!
//! let path = Path::new("models/duck.gltf");
//! let scene: serde_json::Value = serde_json::from_slice(&std::fs::read(path)?)?;
//! let options = ConvertOptions::default().with_embed(EmbedSet::all());
//! let glb = convert(scene, path.parent().unwrap_or(Path::new(".")), &options)?;
//! std::fs::write(path.with_extension("glb"), glb)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod body;
pub mod container;
pub mod convert;
pub mod error;
pub mod image;
pub mod options;
pub mod uri;

pub use body::{Body, BodyPart, BodyRange};
pub use container::{ContainerHeader, write_container};
pub use convert::{convert, relocate};
pub use error::{ConvertError, Result};
pub use self::image::{Dimensions, ImageFormat, ImageMetadata, sniff, sniff_any};
pub use options::{
    BINARY_BUFFER, BINARY_EXTENSION, ConvertOptions, EmbedSet, LEGACY_BINARY_BUFFER, ResourceKind,
};
pub use uri::{DataUri, Resource, parse_data_uri};
