use std::path::{Path, PathBuf};

use super::{GuardRejection, GuardResult};

/// Rejects paths containing `..`, NUL bytes, or that canonicalize outside
/// `allowed_root`. Returns the canonicalized path on success.
pub fn validate_path(candidate: &Path, allowed_root: &Path) -> GuardResult<PathBuf> {
    let raw = candidate.to_string_lossy();
    if raw.as_bytes().contains(&0) {
        return Err(GuardRejection::PathContainsNul);
    }
    if candidate.components().any(|c| c.as_os_str() == "..") {
        return Err(GuardRejection::PathTraversal);
    }

    let canonical_root = allowed_root
        .canonicalize()
        .map_err(|_| GuardRejection::PathOutsideAllowlist)?;

    // The candidate need not exist yet (e.g. a planned temp file), so build
    // the canonical form from the existing parent directory when the leaf
    // itself is missing.
    let canonical_candidate = if candidate.exists() {
        candidate
            .canonicalize()
            .map_err(|_| GuardRejection::PathOutsideAllowlist)?
    } else {
        let parent = candidate.parent().unwrap_or(candidate);
        let canonical_parent = parent
            .canonicalize()
            .map_err(|_| GuardRejection::PathOutsideAllowlist)?;
        match candidate.file_name() {
            Some(name) => canonical_parent.join(name),
            None => canonical_parent,
        }
    };

    if !canonical_candidate.starts_with(&canonical_root) {
        return Err(GuardRejection::PathOutsideAllowlist);
    }

    Ok(canonical_candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_path_inside_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();
        assert!(validate_path(&file, dir.path()).is_ok());
    }

    #[test]
    fn rejects_dotdot_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let traversal = dir.path().join("../escape.mp4");
        assert_eq!(
            validate_path(&traversal, dir.path()),
            Err(GuardRejection::PathTraversal)
        );
    }

    #[test]
    fn rejects_nul_byte() {
        let dir = tempfile::tempdir().unwrap();
        let bad = PathBuf::from(format!("{}/clip\0.mp4", dir.path().display()));
        assert_eq!(
            validate_path(&bad, dir.path()),
            Err(GuardRejection::PathContainsNul)
        );
    }

    #[test]
    fn rejects_symlink_escape() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let link = root.path().join("escape");
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(outside.path(), &link).unwrap();
            let file = link.join("secret.mp4");
            std::fs::write(outside.path().join("secret.mp4"), b"x").unwrap();
            assert_eq!(
                validate_path(&file, root.path()),
                Err(GuardRejection::PathOutsideAllowlist)
            );
        }
    }

    #[test]
    fn accepts_not_yet_existing_path_inside_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        let planned = dir.path().join("future-output.mp4");
        assert!(validate_path(&planned, dir.path()).is_ok());
    }
}
