//! Scene relocation: moves every external resource into the body.
//!
//! Runs in three ordered phases:
//! 1. inline every declared buffer and note its body offset
//! 2. point every buffer view at the body buffer, shifting its offset
//! 3. inline shaders and images when requested
//!
//! Resource fetches inside a phase run in parallel. Payloads are appended to
//! the body afterwards in declaration order, so the output is reproducible.

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::body::{Body, BodyRange};
use crate::error::{ConvertError, Result};
use crate::image::{self, ImageFormat, ImageMetadata};
use crate::options::{BINARY_EXTENSION, ConvertOptions, ResourceKind};
use crate::uri::{self, Resource};

const SHADER_VIEW_PREFIX: &str = "binary_glTF_shader_";
const IMAGE_VIEW_PREFIX: &str = "binary_glTF_images_";

/// Buffer entry as declared in the scene
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferEntry {
    uri: String,
    #[serde(default)]
    byte_length: Option<u64>,
    #[serde(rename = "type", default)]
    buffer_type: Option<String>,
}

/// Convert a parsed scene into a Binary glTF container.
///
/// Relative URIs are resolved against `containing_dir`.
pub fn convert(
    mut scene: Value,
    containing_dir: &Path,
    options: &ConvertOptions,
) -> Result<Vec<u8>> {
    let mut body = Body::new(containing_dir);
    relocate(&mut scene, &mut body, options)?;

    let scene_bytes = serde_json::to_vec(&scene)?;
    let container = body.finalize(&scene_bytes)?;

    tracing::info!(
        "Packed scene ({} bytes) and body ({} bytes, {} parts) into {} bytes",
        scene_bytes.len(),
        body.len(),
        body.parts().len(),
        container.len()
    );

    Ok(container)
}

/// Rewrite `scene` in place so every buffer view points into `body`.
pub fn relocate(scene: &mut Value, body: &mut Body, options: &ConvertOptions) -> Result<()> {
    let root = scene
        .as_object_mut()
        .ok_or_else(|| ConvertError::invalid_scene("top level is not an object"))?;
    let body_buffer = options.body_buffer_name();

    mark_extension_used(root)?;

    let offsets = inline_buffers(root, body)?;
    rewrite_buffer_views(root, &offsets, body_buffer, body.len())?;

    if options.embed.contains(ResourceKind::Shaders) {
        inline_optional(root, body, body_buffer, "shaders", SHADER_VIEW_PREFIX, |_, _| {
            Ok(Map::new())
        })?;
    }

    if options.embed.contains(ResourceKind::Textures) {
        inline_optional(root, body, body_buffer, "images", IMAGE_VIEW_PREFIX, |id, resource| {
            let meta = describe_image(resource)?;
            tracing::debug!(
                "Image {}: {}x{} {}",
                id,
                meta.width,
                meta.height,
                meta.mime_type
            );
            let mut block = Map::new();
            block.insert("mimeType".into(), meta.mime_type.into());
            block.insert("height".into(), meta.height.into());
            block.insert("width".into(), meta.width.into());
            Ok(block)
        })?;
    }

    // Every buffer view now targets the body, so the declared buffers are gone
    let mut buffers = Map::new();
    if options.legacy_buffer_name {
        buffers.insert(
            body_buffer.to_string(),
            json!({ "uri": "", "byteLength": body.len() }),
        );
    }
    root.insert("buffers".into(), Value::Object(buffers));

    Ok(())
}

/// Add the binary extension to `extensionsUsed`.
fn mark_extension_used(root: &mut Map<String, Value>) -> Result<()> {
    match root
        .entry("extensionsUsed")
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(used) => {
            if !used.iter().any(|v| v.as_str() == Some(BINARY_EXTENSION)) {
                used.push(BINARY_EXTENSION.into());
            }
            Ok(())
        }
        _ => Err(ConvertError::invalid_scene("extensionsUsed is not an array")),
    }
}

/// Phase 1: append every buffer to the body, returning `bufferId -> offset`.
fn inline_buffers(root: &Map<String, Value>, body: &mut Body) -> Result<HashMap<String, u64>> {
    let Some(buffers) = category(root, "buffers")? else {
        return Ok(HashMap::new());
    };

    let mut entries = Vec::with_capacity(buffers.len());
    for (id, value) in buffers {
        let entry = BufferEntry::deserialize(value)
            .map_err(|e| ConvertError::invalid_scene(format!("buffer {id}: {e}")))?;

        // Only raw array buffers can be copied into the body
        match entry.buffer_type.as_deref() {
            None | Some("arraybuffer") => {}
            Some(ty) => {
                return Err(ConvertError::UnsupportedBufferType {
                    buffer_id: id.clone(),
                    buffer_type: ty.to_string(),
                });
            }
        }
        entries.push((id, entry));
    }

    let fetched: Result<Vec<Resource>> = entries
        .par_iter()
        .map(|(_, entry)| body.fetch(&entry.uri, entry.byte_length))
        .collect();

    let mut offsets = HashMap::with_capacity(entries.len());
    for ((id, entry), resource) in entries.iter().zip(fetched?) {
        let range = body.push(resource.data);
        tracing::debug!(
            "Buffer {}: {:?} -> offset {}, {} bytes",
            id,
            entry.uri,
            range.offset,
            range.length
        );
        offsets.insert((*id).clone(), range.offset);
    }

    Ok(offsets)
}

/// Phase 2: retarget buffer views at the body buffer.
fn rewrite_buffer_views(
    root: &mut Map<String, Value>,
    offsets: &HashMap<String, u64>,
    body_buffer: &str,
    body_len: u64,
) -> Result<()> {
    let Some(views) = category_mut(root, "bufferViews")? else {
        return Ok(());
    };

    for (view_id, value) in views.iter_mut() {
        let view = value.as_object_mut().ok_or_else(|| {
            ConvertError::invalid_scene(format!("buffer view {view_id} is not an object"))
        })?;

        let buffer_id = view.get("buffer").and_then(Value::as_str).ok_or_else(|| {
            ConvertError::invalid_scene(format!("buffer view {view_id} has no buffer"))
        })?;

        let base = *offsets
            .get(buffer_id)
            .ok_or_else(|| ConvertError::DanglingBufferReference {
                view_id: view_id.clone(),
                buffer_id: buffer_id.to_string(),
            })?;

        let overflow = || {
            ConvertError::invalid_scene(format!("buffer view {view_id} range overflows"))
        };
        let byte_offset = u64_field(view, "byteOffset", view_id)?
            .unwrap_or(0)
            .checked_add(base)
            .ok_or_else(overflow)?;
        let byte_length = u64_field(view, "byteLength", view_id)?.unwrap_or(0);
        let end = byte_offset.checked_add(byte_length).ok_or_else(overflow)?;

        if end > body_len {
            tracing::warn!(
                "Buffer view {} ends at {}, past the end of the body ({} bytes)",
                view_id,
                end,
                body_len
            );
        }

        view.insert("buffer".into(), body_buffer.into());
        view.insert("byteOffset".into(), byte_offset.into());
    }

    Ok(())
}

/// Phase 3: inline each entry of a shader/image category.
///
/// `describe` returns the extra fields of the extension block.
fn inline_optional<F>(
    root: &mut Map<String, Value>,
    body: &mut Body,
    body_buffer: &str,
    name: &str,
    view_prefix: &str,
    describe: F,
) -> Result<()>
where
    F: Fn(&str, &Resource) -> Result<Map<String, Value>>,
{
    let Some(entries) = category(root, name)? else {
        return Ok(());
    };

    let mut pending = Vec::new();
    for (id, value) in entries {
        let uri = value
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| ConvertError::invalid_scene(format!("{name} entry {id} has no uri")))?;

        if uri::is_absolute_url(uri) {
            tracing::warn!("Skipping {} entry {}: absolute URL {:?} is not inlined", name, id, uri);
            continue;
        }
        pending.push((id.clone(), uri.to_string()));
    }

    let fetched: Result<Vec<Resource>> = pending
        .par_iter()
        .map(|(_, uri)| body.fetch(uri, None))
        .collect();
    let fetched = fetched?;

    let mut new_views = Vec::with_capacity(pending.len());
    let mut blocks = Vec::with_capacity(pending.len());
    for ((id, uri), resource) in pending.iter().zip(fetched) {
        let mut block = describe(id.as_str(), &resource)?;
        let view_id = format!("{view_prefix}{id}");
        block.insert("bufferView".into(), view_id.clone().into());

        let BodyRange { offset, length } = body.push(resource.data);
        tracing::debug!(
            "Inlined {} {}: {:?} -> {}, offset {}, {} bytes",
            name,
            id,
            uri,
            view_id,
            offset,
            length
        );

        new_views.push((
            view_id,
            json!({ "buffer": body_buffer, "byteLength": length, "byteOffset": offset }),
        ));
        blocks.push((id.clone(), block));
    }

    if let Some(entries) = category_mut(root, name)? {
        for (id, block) in blocks {
            let Some(entry) = entries.get_mut(&id).and_then(Value::as_object_mut) else {
                continue;
            };
            // Binary glTF readers ignore uri, but it is a required property
            entry.insert("uri".into(), "".into());

            let extensions = entry
                .entry("extensions")
                .or_insert_with(|| Value::Object(Map::new()));
            let extensions = extensions.as_object_mut().ok_or_else(|| {
                ConvertError::invalid_scene(format!("{name} entry {id} has non-object extensions"))
            })?;
            extensions.insert(BINARY_EXTENSION.into(), Value::Object(block));
        }
    }

    let views = match root
        .entry("bufferViews")
        .or_insert_with(|| Value::Object(Map::new()))
    {
        Value::Object(views) => views,
        _ => return Err(ConvertError::invalid_scene("bufferViews is not an object")),
    };
    for (view_id, view) in new_views {
        if views.insert(view_id.clone(), view).is_some() {
            tracing::warn!("Replaced existing buffer view {} with inlined {}", view_id, name);
        }
    }

    Ok(())
}

/// Width, height and media type of an inlined image.
///
/// The header decides the format. A declared media type that names a
/// different supported format is only reported.
fn describe_image(resource: &Resource) -> Result<ImageMetadata> {
    let meta = image::sniff_any(&resource.data)?;

    let declared = resource
        .mime_type
        .as_deref()
        .and_then(|mime| ImageFormat::from_declared(mime).map(|format| (mime, format)));
    if let Some((mime, format)) = declared {
        if format.mime_type() != meta.mime_type {
            tracing::warn!("Image declared as {} is actually {}", mime, meta.mime_type);
        }
    }

    Ok(meta)
}

fn category<'a>(
    root: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a Map<String, Value>>> {
    match root.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ConvertError::invalid_scene(format!("{name} is not an object"))),
    }
}

fn category_mut<'a>(
    root: &'a mut Map<String, Value>,
    name: &str,
) -> Result<Option<&'a mut Map<String, Value>>> {
    match root.get_mut(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ConvertError::invalid_scene(format!("{name} is not an object"))),
    }
}

fn u64_field(entry: &Map<String, Value>, field: &str, id: &str) -> Result<Option<u64>> {
    match entry.get(field) {
        None => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            ConvertError::invalid_scene(format!("{field} of {id} is not a non-negative integer"))
        }),
    }
}
