//! Source file discovery, hashing and titles.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

/// Every `.md` file under `dir` (case-insensitive), sorted by path.
///
/// Unreadable entries are skipped.
pub fn collect_markdown_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_markdown(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

fn is_markdown(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase().ends_with(".md"))
        .unwrap_or(false)
}

/// Lowercase hex SHA-256 of raw file bytes.
pub fn hash_content(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// First `# ` heading line, else the file name.
pub fn extract_title(source: &str, path: &Path) -> String {
    source
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_markdown_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join("A.MD"), "a").unwrap();
        fs::write(root.join("notes.txt"), "x").unwrap();
        fs::write(root.join("nested/c.md"), "c").unwrap();
        fs::write(root.join("nested/deeper/d.Md"), "d").unwrap();
        fs::create_dir_all(root.join("dir.md")).unwrap();

        let files = collect_markdown_files(root);
        let mut expected = vec![
            root.join("A.MD"),
            root.join("b.md"),
            root.join("nested/c.md"),
            root.join("nested/deeper/d.Md"),
        ];
        expected.sort();
        assert_eq!(files, expected);
    }

    #[test]
    fn test_collect_missing_dir_is_empty() {
        assert!(collect_markdown_files(Path::new("/nonexistent/mydocs-dir")).is_empty());
    }

    #[test]
    fn test_hash_content() {
        assert_eq!(
            hash_content(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(hash_content(b"").len(), 64);
    }

    #[test]
    fn test_extract_title() {
        let path = Path::new("/docs/guide.md");
        assert_eq!(extract_title("intro\n  # Getting Started  \n# Later", path), "Getting Started");
        assert_eq!(extract_title("## Only a subheading\n", path), "guide.md");
        assert_eq!(extract_title("#NoSpace\n", path), "guide.md");
        assert_eq!(extract_title("", path), "guide.md");
    }
}
