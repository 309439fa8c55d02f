//! Upload validation, naming, storage, and release of image attachments.
//!
//! References returned by [`MediaStore::store`] are file names relative to
//! the uploads directory; records keep the reference, never an absolute
//! path. Release is best-effort: a failed delete is logged and the owning
//! record's deletion proceeds anyway.

use bytes::Bytes;
use rand::RngCore;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Image types accepted for any upload.
pub const ALLOWED_MIME_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Hard cap per uploaded file.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Maximum files accepted in one multipart request.
pub const MAX_FILES_PER_UPLOAD: usize = 5;

#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Validate and persist one uploaded image. Returns the stored
    /// reference. Rejects disallowed MIME types and oversized payloads
    /// before anything touches disk.
    pub fn store(&self, data: Bytes, declared_mime: &str, owner_id: &str) -> AppResult<String> {
        if !ALLOWED_MIME_TYPES.contains(&declared_mime) {
            return Err(AppError::invalid(
                "photos",
                format!("File type {} not allowed, expected an image", declared_mime),
            ));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::invalid(
                "photos",
                format!("File exceeds the {} MiB limit", MAX_UPLOAD_BYTES / (1024 * 1024)),
            ));
        }
        if data.is_empty() {
            return Err(AppError::invalid("photos", "Empty file"));
        }

        let reference = file_name(owner_id, declared_mime);
        let path = self.root.join(&reference);
        std::fs::write(&path, &data)
            .map_err(|e| AppError::Internal(format!("Failed to store upload: {}", e)))?;

        tracing::debug!("Stored upload {} ({} bytes)", reference, data.len());
        Ok(reference)
    }

    /// Best-effort delete of a stored reference.
    pub fn release(&self, reference: &str) {
        let path = self.root.join(reference);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!("Failed to release upload {}: {}", reference, e);
        }
    }

    /// Absolute path for serving a stored reference, or None if it does
    /// not exist (or escapes the uploads dir).
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        if reference.contains("..") || reference.contains('/') {
            return None;
        }
        let path = self.root.join(reference);
        path.exists().then_some(path)
    }
}

/// Collision-resistant name: owner + millisecond timestamp + random hex,
/// with the extension derived from the declared MIME type.
fn file_name(owner_id: &str, mime: &str) -> String {
    let ext = mime_guess::get_mime_extensions_str(mime)
        .and_then(|exts| exts.first())
        .copied()
        .unwrap_or("bin");

    let mut nonce = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut nonce);

    format!(
        "{}-{}-{}.{}",
        owner_id,
        chrono::Utc::now().timestamp_millis(),
        hex::encode(nonce),
        ext
    )
}
