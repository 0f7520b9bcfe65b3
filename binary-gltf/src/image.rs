//! Raster image sniffing
//!
//! Width and height are read straight from each format's header. Nothing
//! declared outside the image bytes is trusted.
//!
//! | Format | Signature            | Width / height                        |
//! |--------|----------------------|---------------------------------------|
//! | PNG    | `89 50 4E 47` at 0   | u32 BE at 16 / u32 BE at 20           |
//! | JPEG   | `FF D8` at 0         | u16 BE at SOF+7 / u16 BE at SOF+5     |
//! | GIF    | `GIF8` at 0          | u16 LE at 6 / u16 LE at 8             |
//! | BMP    | `BM` at 0            | u32 LE at 18 / u32 LE at 22           |

use serde::Serialize;

use crate::error::{ConvertError, Result};

/// Media types understood by the sniffer, in sniff-any order.
pub const SUPPORTED_MIME_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/bmp"];

const PNG_SIGNATURE: u32 = 0x8950_4E47;
const JPEG_SOI: u16 = 0xFFD8;
const GIF_SIGNATURE: u32 = 0x4749_4638;
const BMP_SIGNATURE: u16 = 0x424D;

/// Pixel dimensions read from an image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Dimensions plus the media type of the format that matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
}

/// Supported raster formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    /// Sniff-any order
    pub const ALL: [ImageFormat; 4] = [Self::Png, Self::Jpeg, Self::Gif, Self::Bmp];

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.mime_type() == mime_type)
    }

    /// Lenient lookup for labels found in the wild (`image/JPG`,
    /// `image/png;charset=binary`).
    pub fn from_declared(mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/x-ms-bmp" | "image/x-bmp" => Some(Self::Bmp),
            other => Self::from_mime_type(other),
        }
    }

    /// Read dimensions if `data` carries this format's signature.
    pub fn detect(self, data: &[u8]) -> Option<Dimensions> {
        match self {
            Self::Png => detect_png(data),
            Self::Jpeg => detect_jpeg(data),
            Self::Gif => detect_gif(data),
            Self::Bmp => detect_bmp(data),
        }
    }
}

/// Sniff an image that is expected to be of `mime_type`.
pub fn sniff(data: &[u8], mime_type: &str) -> Result<Dimensions> {
    let format = ImageFormat::from_mime_type(mime_type)
        .ok_or_else(|| ConvertError::UnsupportedMimeType(mime_type.to_string()))?;
    format
        .detect(data)
        .ok_or_else(|| ConvertError::InvalidImageForType(mime_type.to_string()))
}

/// Try every supported format in order and return the first match.
pub fn sniff_any(data: &[u8]) -> Result<ImageMetadata> {
    ImageFormat::ALL
        .into_iter()
        .find_map(|format| {
            format.detect(data).map(|dims| ImageMetadata {
                width: dims.width,
                height: dims.height,
                mime_type: format.mime_type().to_string(),
            })
        })
        .ok_or(ConvertError::UnrecognizedImageFormat)
}

fn detect_png(data: &[u8]) -> Option<Dimensions> {
    if read_u32_be(data, 0)? != PNG_SIGNATURE {
        return None;
    }
    Some(Dimensions {
        width: read_u32_be(data, 16)?,
        height: read_u32_be(data, 20)?,
    })
}

/// DQT, DHT, DAC, DRI, COM and APP0..APP15
fn is_jpeg_table_marker(marker: u16) -> bool {
    matches!(marker, 0xFFDB | 0xFFC4 | 0xFFCC | 0xFFDD | 0xFFFE | 0xFFE0..=0xFFEF)
}

/// Start-of-frame markers plus DHP
fn is_jpeg_frame_marker(marker: u16) -> bool {
    matches!(
        marker,
        0xFFC0..=0xFFC3 | 0xFFC5..=0xFFC7 | 0xFFC9..=0xFFCB | 0xFFCD..=0xFFCF | 0xFFDE
    )
}

fn detect_jpeg(data: &[u8]) -> Option<Dimensions> {
    if read_u16_be(data, 0)? != JPEG_SOI {
        return None;
    }

    let mut pos = 2;
    while pos < data.len() {
        let marker = read_u16_be(data, pos)?;

        if is_jpeg_frame_marker(marker) {
            // Frame header: length u16, precision u8, lines u16, samples per line u16
            return Some(Dimensions {
                width: read_u16_be(data, pos + 7)? as u32,
                height: read_u16_be(data, pos + 5)? as u32,
            });
        }

        if !is_jpeg_table_marker(marker) {
            return None;
        }

        // Segment length covers itself but not the marker
        pos += 2;
        pos += read_u16_be(data, pos)? as usize;
    }

    None
}

fn detect_gif(data: &[u8]) -> Option<Dimensions> {
    if read_u32_be(data, 0)? != GIF_SIGNATURE {
        return None;
    }
    Some(Dimensions {
        width: read_u16_le(data, 6)? as u32,
        height: read_u16_le(data, 8)? as u32,
    })
}

fn detect_bmp(data: &[u8]) -> Option<Dimensions> {
    if read_u16_be(data, 0)? != BMP_SIGNATURE {
        return None;
    }
    Some(Dimensions {
        width: read_u32_le(data, 18)?,
        height: read_u32_le(data, 22)?,
    })
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    data.get(offset..offset.checked_add(N)?)?.try_into().ok()
}

fn read_u16_be(data: &[u8], offset: usize) -> Option<u16> {
    read_array(data, offset).map(u16::from_be_bytes)
}

fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    read_array(data, offset).map(u16::from_le_bytes)
}

fn read_u32_be(data: &[u8], offset: usize) -> Option<u32> {
    read_array(data, offset).map(u32::from_be_bytes)
}

fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    read_array(data, offset).map(u32::from_le_bytes)
}
