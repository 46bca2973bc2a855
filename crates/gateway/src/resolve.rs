use std::path::{Path, PathBuf};

/// Locate the annotated output for `expected_name` inside `result_dir`.
///
/// An exact match wins. Otherwise the first entry (in name order) whose stem
/// is a substring of the expected stem is taken, which covers outputs whose
/// extension was changed on save. With no candidate the unresolved path is
/// returned; it will fail later existence checks.
pub fn resolve_result(result_dir: &Path, expected_name: &str) -> PathBuf {
    let exact = result_dir.join(expected_name);
    if exact.exists() {
        return exact;
    }

    let expected_stem = stem(expected_name);

    let mut candidates: Vec<PathBuf> = match std::fs::read_dir(result_dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect(),
        Err(e) => {
            tracing::warn!(
                dir = %result_dir.display(),
                error = %e,
                "Result directory unreadable"
            );
            return exact;
        }
    };
    candidates.sort();

    let found = candidates.into_iter().find(|path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(stem)
            .is_some_and(|candidate| !candidate.is_empty() && expected_stem.contains(candidate))
    });

    match found {
        Some(path) => {
            tracing::warn!(
                expected = expected_name,
                resolved = %path.display(),
                "Result resolved by stem match"
            );
            path
        }
        None => {
            tracing::warn!(expected = expected_name, "No result file found");
            exact
        }
    }
}

fn stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}
