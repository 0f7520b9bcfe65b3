//! Conversion options

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Extension name recorded in `extensionsUsed` and on inlined resources
pub const BINARY_EXTENSION: &str = "KHR_binary_glTF";

/// Reserved id of the body buffer
pub const BINARY_BUFFER: &str = "binary_glTF";

/// Body buffer id expected by older Cesium releases
pub const LEGACY_BINARY_BUFFER: &str = "KHR_binary_glTF";

/// Optional resource categories that can be inlined into the body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Textures,
    Shaders,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [Self::Textures, Self::Shaders];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Textures => "textures",
            Self::Shaders => "shaders",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "textures" => Ok(Self::Textures),
            "shaders" => Ok(Self::Shaders),
            other => Err(format!(
                "unknown resource kind {other:?} (expected textures or shaders)"
            )),
        }
    }
}

/// Set of resource categories to inline
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct EmbedSet(BTreeSet<ResourceKind>);

impl EmbedSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        ResourceKind::ALL.into_iter().collect()
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn insert(&mut self, kind: ResourceKind) {
        self.0.insert(kind);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ResourceKind> for EmbedSet {
    fn from_iter<I: IntoIterator<Item = ResourceKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Options controlling a single conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Resource categories inlined alongside the buffers
    pub embed: EmbedSet,

    /// Name the body buffer `KHR_binary_glTF` and keep a descriptor for it.
    /// Default: false (`binary_glTF`, no descriptor)
    pub legacy_buffer_name: bool,
}

impl ConvertOptions {
    pub fn with_embed(mut self, embed: EmbedSet) -> Self {
        self.embed = embed;
        self
    }

    pub fn with_legacy_buffer_name(mut self, legacy: bool) -> Self {
        self.legacy_buffer_name = legacy;
        self
    }

    /// Id that rewritten buffer views point at
    pub fn body_buffer_name(&self) -> &'static str {
        if self.legacy_buffer_name {
            LEGACY_BINARY_BUFFER
        } else {
            BINARY_BUFFER
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConvertOptions::default();
        assert!(options.embed.is_empty());
        assert_eq!(options.body_buffer_name(), "binary_glTF");
    }

    #[test]
    fn test_legacy_buffer_name() {
        let options = ConvertOptions::default().with_legacy_buffer_name(true);
        assert_eq!(options.body_buffer_name(), "KHR_binary_glTF");
    }

    #[test]
    fn test_embed_all() {
        let embed = EmbedSet::all();
        assert!(embed.contains(ResourceKind::Textures));
        assert!(embed.contains(ResourceKind::Shaders));
    }

    #[test]
    fn test_resource_kind_parse() {
        assert_eq!("textures".parse::<ResourceKind>(), Ok(ResourceKind::Textures));
        assert_eq!("shaders".parse::<ResourceKind>(), Ok(ResourceKind::Shaders));
        assert!("meshes".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_options_from_toml() {
        let options: ConvertOptions = toml::from_str(
            r#"
            embed = ["shaders"]
            legacy_buffer_name = true
            "#,
        )
        .unwrap();

        assert!(options.embed.contains(ResourceKind::Shaders));
        assert!(!options.embed.contains(ResourceKind::Textures));
        assert!(options.legacy_buffer_name);
    }

    #[test]
    fn test_options_from_empty_toml() {
        let options: ConvertOptions = toml::from_str("").unwrap();
        assert_eq!(options, ConvertOptions::default());
    }
}
