//! Recursive wallpaper candidate enumeration
//!
//! Walks a configured root directory and collects every non-hidden regular
//! file. There is deliberately no image-type filter; anything that is not a
//! dotfile is considered a candidate. A root that does not exist or cannot
//! be opened yields no candidates rather than an error.

use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Collect candidate files under `root`, skipping hidden files and pruning
/// hidden directories entirely.
pub fn scan(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        // the root itself may be hidden (explicitly configured); only prune below it
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker.filter_map(Result::ok) {
        if entry.file_type().is_file() {
            trace!(path = %entry.path().display(), "adding candidate");
            files.push(entry.into_path());
        }
    }

    debug!(root = %root.display(), candidates = files.len(), "scanned directory");
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_scan_collects_files_recursively() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.png"));
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub/b.jpg"));
        touch(&dir.path().join("sub/c.txt"));

        let mut found = scan(dir.path());
        found.sort();
        assert_eq!(
            found,
            vec![
                dir.path().join("a.png"),
                dir.path().join("sub/b.jpg"),
                dir.path().join("sub/c.txt"),
            ]
        );
    }

    #[test]
    fn test_scan_skips_hidden_entries() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("visible.png"));
        touch(&dir.path().join(".hidden.png"));
        fs::create_dir(dir.path().join(".cache")).unwrap();
        touch(&dir.path().join(".cache/inside.png"));

        let found = scan(dir.path());
        assert_eq!(found, vec![dir.path().join("visible.png")]);
    }

    #[test]
    fn test_scan_hidden_root_is_not_pruned() {
        let dir = tempdir().unwrap();
        let root = dir.path().join(".wallpapers");
        fs::create_dir(&root).unwrap();
        touch(&root.join("a.png"));

        assert_eq!(scan(&root), vec![root.join("a.png")]);
    }

    #[test]
    fn test_scan_missing_root_yields_nothing() {
        let dir = tempdir().unwrap();
        assert!(scan(&dir.path().join("gone")).is_empty());
    }
}
