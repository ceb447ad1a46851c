//! Filesystem helpers.

use std::io;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;

/// Recursively enumerate the files under `root`.
///
/// Returns paths relative to `root`, sorted, so callers derive the same
/// URL set on every run.
pub fn find_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("not a directory: {}", root.display()),
        ));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();

    Ok(files)
}
