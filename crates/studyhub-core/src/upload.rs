//! Uploaded study material and its acceptance rules

use std::path::Path;

use crate::error::UploadError;

/// Largest accepted upload (10 MB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Accepted type fragments, matched against both the extension and the MIME type
const ALLOWED_TYPES: &[&str] = &["jpeg", "jpg", "png", "pdf", "mp4"];

/// A file received from a client or read from disk
#[derive(Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Guess the MIME type from the file extension, for files read from disk
    pub fn from_path_bytes(path: &Path, bytes: Vec<u8>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self::new(name, mime_type, bytes)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn extension(&self) -> String {
        extension_of(&self.name)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }

    /// Check size and type. Both the extension and the MIME type must name an
    /// allowed type.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                size: self.bytes.len(),
                limit: MAX_UPLOAD_BYTES,
            });
        }

        let extension_ok = matches_allowed(&self.extension());
        let mime_ok = matches_allowed(&self.mime_type.to_lowercase());
        if !(extension_ok && mime_ok) {
            return Err(UploadError::UnsupportedType {
                name: self.name.clone(),
                mime_type: self.mime_type.clone(),
            });
        }
        Ok(())
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn matches_allowed(value: &str) -> bool {
    !value.is_empty() && ALLOWED_TYPES.iter().any(|t| value.contains(t))
}
