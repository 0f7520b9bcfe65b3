//! Conversion defaults loaded from a TOML file
//!
//! ```toml
//! # Resource categories to inline: "textures", "shaders"
//! embed = ["textures"]
//!
//! # Use the KHR_binary_glTF body buffer name (older Cesium releases)
//! legacy_buffer_name = false
//! ```
//!
//! Command-line flags override whatever the file sets.

use anyhow::{Context, Result};
use binary_gltf::ConvertOptions;
use std::path::Path;

/// Load options from file
pub fn load(path: &Path) -> Result<ConvertOptions> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Parse options from string
pub fn parse(content: &str) -> Result<ConvertOptions> {
    Ok(toml::from_str(content)?)
}
