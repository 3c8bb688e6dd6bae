use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

/// Recognized image extensions, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "bmp", "gif"];

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Replace a leading `~` with the user's home directory.
pub fn expand_home(folder: &Path) -> PathBuf {
    match (folder.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => folder.to_path_buf(),
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Resolve `~`, `..` and symlinks so one folder has one spelling.
fn resolve(folder: &Path) -> Option<PathBuf> {
    let expanded = expand_home(folder);
    match fs::canonicalize(&expanded) {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::warn!(folder = %expanded.display(), %err, "cannot resolve folder; skipping");
            None
        }
    }
}

/// Recursively collect image files under `folders`, oldest first.
pub fn scan_folders<P: AsRef<Path>>(folders: &[P]) -> Vec<PathBuf> {
    scan_folders_excluding(folders, &[])
}

/// Like [`scan_folders`], but never descends into `excluded` directories.
///
/// Roots are canonicalized and each file is reported once, even when
/// roots overlap or name the same folder differently.
pub fn scan_folders_excluding<P: AsRef<Path>>(folders: &[P], excluded: &[PathBuf]) -> Vec<PathBuf> {
    let excluded: Vec<PathBuf> = excluded
        .iter()
        .map(|dir| fs::canonicalize(expand_home(dir)).unwrap_or_else(|_| expand_home(dir)))
        .collect();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();

    for root in folders.iter().filter_map(|f| resolve(f.as_ref())) {
        if !root.is_dir() {
            tracing::warn!(folder = %root.display(), "not a directory; skipping");
            continue;
        }
        for entry in WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| !is_hidden(e) && !excluded.iter().any(|x| e.path() == x.as_path()))
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() || !is_image(entry.path()) {
                continue;
            }
            if !seen.insert(entry.path().to_path_buf()) {
                continue;
            }
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, entry.into_path()));
        }
    }

    found.sort_by_key(|(modified, _)| *modified);
    tracing::info!(images = found.len(), "scan complete");
    found.into_iter().map(|(_, path)| path).collect()
}

/// Modification time of `path`, if it can be read.
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use tempfile::TempDir;

    fn touch(path: &Path, secs: i64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
        set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("a.JPG")));
        assert!(is_image(Path::new("dir/b.webp")));
        assert!(is_image(Path::new("c.Jpeg")));
        assert!(!is_image(Path::new("d.tiff")));
        assert!(!is_image(Path::new("jpg")));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/Pictures")), home.join("Pictures"));
        }
    }

    #[test]
    fn test_scan_filters_and_orders_by_mtime() {
        let dir = TempDir::new().unwrap();
        let root = &dir.path().canonicalize().unwrap();
        touch(&root.join("new.PNG"), 3_000);
        touch(&root.join("old.jpg"), 1_000);
        touch(&root.join("nested/mid.gif"), 2_000);
        touch(&root.join("notes.txt"), 500);
        touch(&root.join(".hidden.jpg"), 100);
        touch(&root.join(".cache/thumb.png"), 100);

        let images = scan_folders(&[root]);

        assert_eq!(
            images,
            vec![
                root.join("old.jpg"),
                root.join("nested/mid.gif"),
                root.join("new.PNG"),
            ]
        );
    }

    #[test]
    fn test_missing_folder_is_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("a.bmp"), 10);
        let missing = root.join("nope");
        let images = scan_folders(&[missing.as_path(), root.as_path()]);
        assert_eq!(images, vec![root.join("a.bmp")]);
    }

    #[test]
    fn test_aliased_roots_report_each_file_once() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("only.jpg"), 10);
        touch(&root.join("sub/inner.png"), 20);

        let images = scan_folders(&[root.clone(), root.join("sub/.."), root.join("sub")]);

        assert_eq!(images, vec![root.join("only.jpg"), root.join("sub/inner.png")]);
    }

    #[test]
    fn test_excluded_directory_is_not_walked() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("keep.jpg"), 10);
        touch(&root.join("duplicates/keep.jpg"), 20);

        let images = scan_folders_excluding(&[&root], &[root.join("duplicates")]);

        assert_eq!(images, vec![root.join("keep.jpg")]);
    }
}
