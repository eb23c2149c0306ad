//! Filesystem wrappers used by the static-file handlers.

use crate::dream::error::{DreamError, Result};
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Reads the entire content of a file.
pub fn load_file(file_path: &Path) -> Result<Vec<u8>> {
    let file = File::open(file_path).map_err(DreamError::Filesystem)?;
    let mut reader = BufReader::new(file);
    let mut contents = Vec::new();
    reader
        .read_to_end(&mut contents)
        .map_err(DreamError::Filesystem)?;
    Ok(contents)
}

/// Maps a request path onto a file under `root` and stats it.
///
/// Extensionless paths are treated as page requests; the bare `/` resolves
/// to `index.html`. The stat result is returned alongside the path so HEAD
/// handling can answer from metadata alone.
pub fn resolve_file_path(target_path: &str, root: &str) -> (PathBuf, io::Result<Metadata>) {
    let relative = target_path.trim_start_matches('/');

    let file_path = if target_path == "/" {
        Path::new(root).join("index.html")
    } else {
        Path::new(root).join(relative)
    };

    let stat = fs::metadata(&file_path);
    (file_path, stat)
}
