use std::path::{Path, PathBuf};
use uuid::Uuid;

/// An uploaded image persisted under a generated name.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub id: Uuid,
    /// Extension of the client-supplied name including the leading dot, or
    /// empty.
    pub extension: String,
    pub path: PathBuf,
}

impl UploadedFile {
    pub fn file_name(&self) -> String {
        format!("{}{}", self.id, self.extension)
    }
}

/// Writes uploads into a single flat directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist `bytes` as `<uuid-v4><ext>`, where `ext` comes from
    /// `original_name`. Never overwrites an earlier upload.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<UploadedFile> {
        let id = Uuid::new_v4();
        let extension = extension_of(original_name);
        let path = self.dir.join(format!("{id}{extension}"));

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(
            original_name,
            path = %path.display(),
            bytes = bytes.len(),
            "Upload stored"
        );

        Ok(UploadedFile {
            id,
            extension,
            path,
        })
    }
}

/// Extension of a client-supplied file name, with its leading dot.
///
/// Only the final path component counts, so `C:\photos\cat.JPG` gives
/// `.JPG`. Extensions with characters other than ASCII letters and digits
/// are dropped.
pub fn extension_of(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);

    match Path::new(base).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!(".{ext}")
        }
        _ => String::new(),
    }
}
