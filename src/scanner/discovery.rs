use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Hidden entries (leading dot) are skipped entirely; pruned directories
/// are not descended into. The walk root itself is exempt so a
/// registered dot-directory can still be scanned.
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Enumerate candidate image files under `directory`, sorted by path.
///
/// Extensions are matched case-insensitively against the allow-list.
/// A missing or unreadable root yields an empty list rather than an
/// error; per-entry walk errors are skipped.
pub fn discover_images(directory: &Path, extensions: &[String], recursive: bool) -> Vec<PathBuf> {
    let allowed: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();

    let mut walker = WalkDir::new(directory).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut images = Vec::new();

    for entry in walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension() {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                if allowed.iter().any(|e| e == &ext_lower) {
                    images.push(path.to_path_buf());
                }
            }
        }
    }

    images.sort();

    images
}
