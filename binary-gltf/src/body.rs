//! Body accumulator
//!
//! Collects resource payloads into the contiguous binary body of the
//! container. Each payload gets the running total as its offset, so parts
//! never overlap.
//!
//! Fetching (`fetch`) only needs `&self` and can run on any thread.
//! Offset assignment (`push`) needs `&mut self`, which serializes it.

use std::path::{Path, PathBuf};

use crate::container;
use crate::error::Result;
use crate::uri::{self, Resource};

/// Location of one payload inside the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyRange {
    pub offset: u64,
    pub length: u64,
}

/// A payload and the offset it was assigned
#[derive(Debug, Clone)]
pub struct BodyPart {
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Append-only accumulator for the container body
#[derive(Debug)]
pub struct Body {
    containing_dir: PathBuf,
    length: u64,
    parts: Vec<BodyPart>,
}

impl Body {
    /// Create an empty body resolving relative URIs against `containing_dir`
    pub fn new(containing_dir: impl Into<PathBuf>) -> Self {
        Self {
            containing_dir: containing_dir.into(),
            length: 0,
            parts: Vec::new(),
        }
    }

    pub fn containing_dir(&self) -> &Path {
        &self.containing_dir
    }

    /// Current body length in bytes
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Parts in the order they were appended
    pub fn parts(&self) -> &[BodyPart] {
        &self.parts
    }

    /// Resolve `uri`, truncating to `expected_len` when the resource is longer.
    ///
    /// Shorter resources are kept at their actual length.
    pub fn fetch(&self, uri: &str, expected_len: Option<u64>) -> Result<Resource> {
        let mut resource = uri::resolve(uri, &self.containing_dir)?;

        if let Some(expected) = expected_len {
            let actual = resource.data.len() as u64;
            if expected < actual {
                resource.data.truncate(expected as usize);
            } else if expected > actual {
                tracing::warn!(
                    "Resource {:?} is {} bytes, shorter than its declared {} bytes",
                    uri,
                    actual,
                    expected
                );
            }
        }

        Ok(resource)
    }

    /// Append a payload at the end of the body
    pub fn push(&mut self, data: Vec<u8>) -> BodyRange {
        let range = BodyRange {
            offset: self.length,
            length: data.len() as u64,
        };
        self.parts.push(BodyPart {
            offset: range.offset,
            data,
        });
        self.length += range.length;
        range
    }

    /// Fetch `uri` and append it
    pub fn add(&mut self, uri: &str, expected_len: Option<u64>) -> Result<BodyRange> {
        let resource = self.fetch(uri, expected_len)?;
        Ok(self.push(resource.data))
    }

    /// Assemble the container around `scene` and this body
    pub fn finalize(&self, scene: &[u8]) -> Result<Vec<u8>> {
        container::write_container(scene, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_follow_running_total() {
        let mut body = Body::new(".");
        let a = body.push(vec![1; 5]);
        let b = body.push(vec![2; 3]);
        let c = body.push(Vec::new());
        let d = body.push(vec![4; 7]);

        assert_eq!(a, BodyRange { offset: 0, length: 5 });
        assert_eq!(b, BodyRange { offset: 5, length: 3 });
        assert_eq!(c, BodyRange { offset: 8, length: 0 });
        assert_eq!(d, BodyRange { offset: 8, length: 7 });
        assert_eq!(body.len(), 15);
    }

    #[test]
    fn test_parts_never_overlap() {
        let mut body = Body::new(".");
        for len in [3usize, 0, 17, 1, 4, 4, 250] {
            body.push(vec![0xAB; len]);
        }

        let total: u64 = body.parts().iter().map(|p| p.data.len() as u64).sum();
        assert_eq!(body.len(), total);

        for pair in body.parts().windows(2) {
            assert!(pair[0].offset + pair[0].data.len() as u64 <= pair[1].offset);
        }
    }

    #[test]
    fn test_add_truncates_to_expected_length() {
        let mut body = Body::new(".");
        let range = body
            .add("data:application/octet-stream;base64,AQIDBAUG", Some(4))
            .unwrap();
        assert_eq!(range, BodyRange { offset: 0, length: 4 });
        assert_eq!(body.parts()[0].data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_add_never_pads_short_data() {
        let mut body = Body::new(".");
        let range = body
            .add("data:application/octet-stream;base64,AQID", Some(16))
            .unwrap();
        assert_eq!(range.length, 3);
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn test_add_reads_relative_files() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("a.bin"), [1u8, 2]).unwrap();
        std::fs::write(dir.path().join("b.bin"), [3u8, 4, 5]).unwrap();

        let mut body = Body::new(dir.path());
        let a = body.add("a.bin", None).unwrap();
        let b = body.add("b.bin", None).unwrap();

        assert_eq!(a, BodyRange { offset: 0, length: 2 });
        assert_eq!(b, BodyRange { offset: 2, length: 3 });
    }

    #[test]
    fn test_failed_add_leaves_body_untouched() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut body = Body::new(dir.path());
        body.push(vec![1, 2, 3]);

        assert!(body.add("missing.bin", None).is_err());
        assert_eq!(body.len(), 3);
        assert_eq!(body.parts().len(), 1);
    }
}
