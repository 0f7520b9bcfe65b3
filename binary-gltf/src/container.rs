//! Binary glTF container (version 1)
//!
//! # Layout
//! ```text
//! 0x00: magic u32 ("glTF", big-endian 0x676C5446)
//! 0x04: version u32 (1)
//! 0x08: length u32 (whole file)
//! 0x0C: scene_length u32 (padded, multiple of 4)
//! 0x10: scene_format u32 (0 = JSON)
//! 0x14: scene (padded with spaces)
//! var:  body
//! ```
//! All fields except the magic are little-endian.

use crate::body::Body;
use crate::error::{ConvertError, Result};

/// ASCII "glTF"
pub const MAGIC: u32 = 0x676C_5446;
pub const VERSION: u32 = 1;
pub const SCENE_FORMAT_JSON: u32 = 0;

/// Container header (20 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub magic: u32,
    pub version: u32,
    pub length: u32,
    pub scene_length: u32,
    pub scene_format: u32,
}

impl ContainerHeader {
    pub const SIZE: usize = 20;

    pub fn new(length: u32, scene_length: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            length,
            scene_length,
            scene_format: SCENE_FORMAT_JSON,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.length.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.scene_length.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.scene_format.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            magic: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            version: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            length: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            scene_length: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            scene_format: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
        })
    }

    /// Header for a scene of `scene_len` bytes (before padding) and a body of
    /// `body_len` bytes.
    pub fn for_lengths(scene_len: u64, body_len: u64) -> Result<Self> {
        let scene_length = pad_to_4(scene_len).ok_or(ConvertError::ContainerTooLarge(u64::MAX))?;
        let total_length = (Self::SIZE as u64)
            .checked_add(scene_length)
            .and_then(|len| len.checked_add(body_len))
            .ok_or(ConvertError::ContainerTooLarge(u64::MAX))?;

        let too_large = || ConvertError::ContainerTooLarge(total_length);
        Ok(Self::new(
            u32::try_from(total_length).map_err(|_| too_large())?,
            u32::try_from(scene_length).map_err(|_| too_large())?,
        ))
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && self.version == VERSION
    }

    /// Byte offset of the body inside the container
    pub fn body_offset(&self) -> usize {
        Self::SIZE + self.scene_length as usize
    }
}

/// Round up to the next multiple of 4
pub fn pad_to_4(len: u64) -> Option<u64> {
    Some(len.checked_add(3)? & !3)
}

/// Assemble header, padded scene and body into one buffer.
pub fn write_container(scene: &[u8], body: &Body) -> Result<Vec<u8>> {
    let header = ContainerHeader::for_lengths(scene.len() as u64, body.len())?;
    let body_offset = header.body_offset();
    let total_length = header.length as usize;

    let mut out = vec![0u8; total_length];
    out[..ContainerHeader::SIZE].copy_from_slice(&header.to_bytes());

    let scene_start = ContainerHeader::SIZE;
    let scene_end = scene_start + scene.len();
    out[scene_start..scene_end].copy_from_slice(scene);
    out[scene_end..body_offset].fill(b' ');

    // Offsets are disjoint, so order does not matter
    for part in body.parts() {
        let start = body_offset + part.offset as usize;
        out[start..start + part.data.len()].copy_from_slice(&part.data);
    }

    Ok(out)
}
