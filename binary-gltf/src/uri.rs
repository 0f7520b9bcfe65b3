//! Resource locator: turns a scene URI into raw bytes.
//!
//! Two kinds of URI are understood:
//! - `data:` URIs, decoded in place
//! - anything else, read as a path relative to the scene's directory
//!
//! # Data URI grammar
//! ```text
//! data:[<mediatype>][;charset=<charset>][;base64],<data>
//! ```
//! An omitted media type defaults to `text/plain;charset=US-ASCII`.

use std::path::Path;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::{ConvertError, Result};

const DATA_SCHEME: &str = "data:";
const DEFAULT_MEDIA_TYPE: &str = "text/plain";
const DEFAULT_CHARSET: &str = "US-ASCII";

/// Standard alphabet, accepting input with or without `=` padding.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Raw bytes of a resolved URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub data: Vec<u8>,
    /// Media type declared by the URI itself (only data URIs declare one)
    pub mime_type: Option<String>,
}

/// Decoded `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Returns true for `http://` and `https://` URIs.
pub fn is_absolute_url(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

/// Resolve a URI to bytes, reading relative paths from `containing_dir`.
pub fn resolve(uri: &str, containing_dir: &Path) -> Result<Resource> {
    if uri.starts_with(DATA_SCHEME) {
        let DataUri { mime_type, data } = parse_data_uri(uri)?;
        return Ok(Resource {
            data,
            mime_type: Some(mime_type),
        });
    }

    let path = containing_dir.join(uri);
    let data = std::fs::read(&path).map_err(|source| ConvertError::ResourceRead {
        uri: uri.to_string(),
        path: path.clone(),
        source,
    })?;

    Ok(Resource {
        data,
        mime_type: None,
    })
}

/// Decode a `data:` URI.
pub fn parse_data_uri(uri: &str) -> Result<DataUri> {
    let unsupported = || ConvertError::UnsupportedDataUri(abbreviate(uri));

    let rest = uri.strip_prefix(DATA_SCHEME).ok_or_else(unsupported)?;
    let (header, payload) = rest.split_once(',').ok_or_else(unsupported)?;

    let mut params = header.split(';');
    // split always yields at least one item
    let media_type = params.next().unwrap_or_default();
    if !media_type.is_empty() && !is_media_type(media_type) {
        return Err(unsupported());
    }

    let mut charset = None;
    let mut base64 = false;
    for param in params {
        if base64 {
            // ;base64 must be the final parameter
            return Err(unsupported());
        }
        if param == "base64" {
            base64 = true;
        } else if let Some(value) = param.strip_prefix("charset=") {
            if charset.is_some() || value.is_empty() {
                return Err(unsupported());
            }
            charset = Some(value);
        } else {
            return Err(unsupported());
        }
    }

    let mime_type = match (media_type, charset) {
        ("", charset) => format!(
            "{DEFAULT_MEDIA_TYPE};charset={}",
            charset.unwrap_or(DEFAULT_CHARSET)
        ),
        (media_type, Some(charset)) => format!("{media_type};charset={charset}"),
        (media_type, None) => media_type.to_string(),
    };

    let data = if base64 {
        BASE64.decode(payload).map_err(|_| unsupported())?
    } else {
        percent_decode(payload)
    };

    Ok(DataUri { mime_type, data })
}

/// `type/subtype` with no whitespace
fn is_media_type(s: &str) -> bool {
    match s.split_once('/') {
        Some((ty, subtype)) => {
            !ty.is_empty()
                && !subtype.is_empty()
                && !subtype.contains('/')
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Decode `%XX` escapes; malformed escapes are kept literally.
fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Long base64 payloads make useless error messages
fn abbreviate(uri: &str) -> String {
    const MAX: usize = 64;
    match uri.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &uri[..idx]),
        None => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_mime_type() {
        let uri = parse_data_uri("data:text/html;base64,PGh0bWw+").unwrap();
        assert_eq!(uri.mime_type, "text/html");
        assert_eq!(uri.data, b"<html>");
    }

    #[test]
    fn test_unpadded_base64() {
        let uri = parse_data_uri("data:text/plain;base64,SSBsb3ZlIHlvdSE").unwrap();
        assert_eq!(uri.mime_type, "text/plain");
        assert_eq!(uri.data, b"I love you!");
    }

    #[test]
    fn test_padded_base64() {
        let uri = parse_data_uri("data:text/plain;base64,SSBsb3ZlIHlvdSE=").unwrap();
        assert_eq!(uri.mime_type, "text/plain");
        assert_eq!(uri.data, b"I love you!");
    }

    #[test]
    fn test_plain_data() {
        let uri = parse_data_uri("data:text/plain,I love you!").unwrap();
        assert_eq!(uri.data, b"I love you!");
    }

    #[test]
    fn test_default_mime_type() {
        let uri = parse_data_uri("data:,I love you!").unwrap();
        assert_eq!(uri.mime_type, "text/plain;charset=US-ASCII");
        assert_eq!(uri.data, b"I love you!");
    }

    #[test]
    fn test_implicit_text_plain_with_charset() {
        let uri = parse_data_uri("data:;charset=utf-8,I love you!").unwrap();
        assert_eq!(uri.mime_type, "text/plain;charset=utf-8");
        assert_eq!(uri.data, b"I love you!");
    }

    #[test]
    fn test_charset_with_base64() {
        let uri = parse_data_uri("data:text/plain;charset=utf-8;base64,SGk=").unwrap();
        assert_eq!(uri.mime_type, "text/plain;charset=utf-8");
        assert_eq!(uri.data, b"Hi");
    }

    #[test]
    fn test_percent_decoding() {
        let uri = parse_data_uri("data:,a%20b%2Cc%zz").unwrap();
        assert_eq!(uri.data, b"a b,c%zz");
    }

    #[test]
    fn test_malformed_uris() {
        for bad in [
            "data:text/plain;base64",
            "data:notamediatype,abc",
            "data:text/plain;base64;charset=utf-8,SGk=",
            "data:text/plain;foo=bar,abc",
            "data:application/octet-stream;base64,@@@@",
            "file:text/plain,abc",
        ] {
            assert!(
                matches!(parse_data_uri(bad), Err(ConvertError::UnsupportedDataUri(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_data_uri() {
        let resource =
            resolve("data:application/octet-stream;base64,AQID", Path::new(".")).unwrap();
        assert_eq!(resource.data, vec![1, 2, 3]);
        assert_eq!(resource.mime_type.as_deref(), Some("application/octet-stream"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("data.bin"), [9u8, 8, 7]).unwrap();

        let resource = resolve("data.bin", dir.path()).unwrap();
        assert_eq!(resource.data, vec![9, 8, 7]);
        assert_eq!(resource.mime_type, None);
    }

    #[test]
    fn test_resolve_missing_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = resolve("missing.bin", dir.path()).unwrap_err();
        match err {
            ConvertError::ResourceRead { uri, source, .. } => {
                assert_eq!(uri, "missing.bin");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_absolute_urls() {
        assert!(is_absolute_url("http://example.com/a.png"));
        assert!(is_absolute_url("https://example.com/a.png"));
        assert!(!is_absolute_url("textures/a.png"));
        assert!(!is_absolute_url("data:,x"));
    }
}
