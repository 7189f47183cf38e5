use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Fallback MIME type when the file name gives no usable hint.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Raw photo bytes selected by the user, owned by the draft for its lifetime.
///
/// Cloning is cheap; the bytes are shared, so snapshots handed to the
/// classification and submission tasks never copy the image.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    bytes: Arc<[u8]>,
    file_name: Option<String>,
}

impl ImageBlob {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// File name sent with multipart uploads.
    pub fn upload_name(&self) -> String {
        self.file_name
            .clone()
            .unwrap_or_else(|| "upload.jpg".to_string())
    }

    /// MIME type derived from the file name extension.
    ///
    /// The classification service rejects parts without an `image/*` type,
    /// so unknown extensions fall back to [`DEFAULT_IMAGE_MIME`].
    pub fn content_type(&self) -> &'static str {
        let ext = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match ext.as_deref() {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("bmp") => "image/bmp",
            Some("heic") => "image/heic",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            _ => DEFAULT_IMAGE_MIME,
        }
    }

    /// Lowercase hex SHA-256 of the image bytes, used as the image reference
    /// in ingestion payloads.
    pub fn image_ref(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("len", &self.bytes.len())
            .field("file_name", &self.file_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(ImageBlob::new(vec![1]).with_file_name("a.PNG").content_type(), "image/png");
        assert_eq!(ImageBlob::new(vec![1]).with_file_name("a.jpeg").content_type(), "image/jpeg");
        assert_eq!(ImageBlob::new(vec![1]).with_file_name("a.txt").content_type(), "image/jpeg");
        assert_eq!(ImageBlob::new(vec![1]).content_type(), "image/jpeg");
    }

    #[test]
    fn test_image_ref_is_sha256_hex() {
        let blob = ImageBlob::new(b"abc".to_vec());
        assert_eq!(
            blob.image_ref(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_clone_shares_bytes() {
        let blob = ImageBlob::new(vec![0u8; 1024]);
        let copy = blob.clone();
        assert!(std::ptr::eq(blob.bytes().as_ptr(), copy.bytes().as_ptr()));
    }

    #[test]
    fn test_debug_omits_bytes() {
        let blob = ImageBlob::new(vec![7u8; 3]).with_file_name("deer.jpg");
        assert_eq!(
            format!("{:?}", blob),
            "ImageBlob { len: 3, file_name: Some(\"deer.jpg\") }"
        );
    }
}
