use std::path::{Component, Path, PathBuf};

/// Result artifacts, addressed by their plain file name inside the results
/// directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identifier for a file directly inside the results directory.
    pub fn id_for(&self, path: &Path) -> Option<String> {
        if path.parent()? != self.root.as_path() {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        is_valid_id(name).then(|| name.to_string())
    }

    /// Path of an existing regular file for `id`, or `None` for anything
    /// that is not a plain name inside the results directory.
    pub async fn locate(&self, id: &str) -> Option<PathBuf> {
        if !is_valid_id(id) {
            tracing::debug!(artifact = id, "Rejected artifact identifier");
            return None;
        }

        let path = self.root.join(id);
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

/// A single normal path component without separators.
pub fn is_valid_id(id: &str) -> bool {
    if id.is_empty() || id.contains(['/', '\\', '\0']) {
        return false;
    }

    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
