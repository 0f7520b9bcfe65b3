//! binary-gltf - converts a glTF scene into a Binary glTF file
//!
//! # Usage
//!
//! ```bash
//! # Inline buffers only
//! binary-gltf models/duck.gltf
//!
//! # Inline buffers, textures and shaders
//! binary-gltf models/duck.gltf --embed
//!
//! # Inline buffers and shaders
//! binary-gltf models/duck.gltf --embed shaders
//! ```
//!
//! The container is written next to the input with a `.glb` extension.
//!
//! `--embed` takes every following word as a kind, so put it after the
//! input file, or end it with `--` (`binary-gltf --embed -- duck.gltf`).

mod config;

use anyhow::{Context, Result, bail};
use binary_gltf::{ContainerHeader, ConvertOptions, EmbedSet, ResourceKind};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const SCENE_EXTENSION: &str = "gltf";
const CONTAINER_EXTENSION: &str = "glb";

#[derive(Parser)]
#[command(name = "binary-gltf")]
#[command(about = "Converts a glTF scene into a Binary glTF (.glb) file")]
#[command(version)]
struct Cli {
    /// Input scene (.gltf)
    file: PathBuf,

    /// Embed textures and/or shaders into the body (no value embeds both).
    /// Place after FILE, or end the list with `--`
    #[arg(short, long, value_enum, num_args = 0..)]
    embed: Option<Vec<EmbedArg>>,

    /// Use the KHR_binary_glTF body buffer name expected by older Cesium releases
    #[arg(long)]
    cesium: bool,

    /// Output file (defaults to the input with a .glb extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file with conversion defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedArg {
    Textures,
    Shaders,
}

impl From<EmbedArg> for ResourceKind {
    fn from(arg: EmbedArg) -> Self {
        match arg {
            EmbedArg::Textures => ResourceKind::Textures,
            EmbedArg::Shaders => ResourceKind::Shaders,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to create binary GLTF file:");
            eprintln!("----------------------------------");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.file.extension().and_then(|e| e.to_str()) != Some(SCENE_EXTENSION) {
        bail!("File specified does not have the .gltf extension.");
    }

    let options = resolve_options(cli)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.file.with_extension(CONTAINER_EXTENSION));

    tracing::info!("Converting {:?} -> {:?}", cli.file, output);
    if !options.embed.is_empty() {
        let kinds: Vec<_> = options.embed.iter().map(|k| k.as_str()).collect();
        tracing::info!("Embedding {}", kinds.join(", "));
    }

    let text = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read scene: {}", cli.file.display()))?;
    let scene: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse scene: {}", cli.file.display()))?;

    let containing_dir = cli.file.parent().unwrap_or(Path::new("."));
    let glb = binary_gltf::convert(scene, containing_dir, &options)?;

    std::fs::write(&output, &glb)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    if let Some(header) = ContainerHeader::from_bytes(&glb) {
        tracing::debug!(
            "Container: {} bytes (scene {} bytes, body {} bytes)",
            header.length,
            header.scene_length,
            glb.len() - header.body_offset()
        );
    }
    tracing::info!("Done!");

    Ok(())
}

/// Config file first, then command-line overrides
fn resolve_options(cli: &Cli) -> Result<ConvertOptions> {
    let mut options = match &cli.config {
        Some(path) => config::load(path)?,
        None => ConvertOptions::default(),
    };

    if let Some(kinds) = &cli.embed {
        options.embed = if kinds.is_empty() {
            EmbedSet::all()
        } else {
            kinds.iter().copied().map(ResourceKind::from).collect()
        };
    }
    if cli.cesium {
        options.legacy_buffer_name = true;
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("binary-gltf").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_embed_by_default() {
        let options = resolve_options(&parse(&["scene.gltf"])).unwrap();
        assert!(options.embed.is_empty());
        assert!(!options.legacy_buffer_name);
    }

    #[test]
    fn test_bare_embed_means_all() {
        let options = resolve_options(&parse(&["scene.gltf", "--embed"])).unwrap();
        assert_eq!(options.embed, EmbedSet::all());
    }

    #[test]
    fn test_embed_single_kind() {
        let options = resolve_options(&parse(&["scene.gltf", "-e", "shaders"])).unwrap();
        assert!(options.embed.contains(ResourceKind::Shaders));
        assert!(!options.embed.contains(ResourceKind::Textures));
    }

    #[test]
    fn test_embed_rejects_unknown_kind() {
        let args = ["binary-gltf", "scene.gltf", "-e", "meshes"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_embed_before_file() {
        // The file name is taken as an embed kind
        let args = ["binary-gltf", "--embed", "scene.gltf"];
        assert!(Cli::try_parse_from(args).is_err());

        let cli = parse(&["--embed", "--", "scene.gltf"]);
        assert_eq!(cli.file, PathBuf::from("scene.gltf"));
        assert_eq!(resolve_options(&cli).unwrap().embed, EmbedSet::all());

        let cli = parse(&["-e", "textures", "--", "scene.gltf"]);
        let options = resolve_options(&cli).unwrap();
        assert_eq!(options.embed, [ResourceKind::Textures].into_iter().collect::<EmbedSet>());
    }

    #[test]
    fn test_cesium_sets_legacy_name() {
        let options = resolve_options(&parse(&["scene.gltf", "--cesium"])).unwrap();
        assert!(options.legacy_buffer_name);
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = dir.path().join("binary-gltf.toml");
        std::fs::write(&config, "embed = [\"textures\"]\n").unwrap();
        let config = config.to_str().unwrap();

        let options = resolve_options(&parse(&["scene.gltf", "-c", config])).unwrap();
        assert_eq!(options.embed, [ResourceKind::Textures].into_iter().collect::<EmbedSet>());

        let options =
            resolve_options(&parse(&["scene.gltf", "-c", config, "-e", "shaders"])).unwrap();
        assert_eq!(options.embed, [ResourceKind::Shaders].into_iter().collect::<EmbedSet>());
    }
}
