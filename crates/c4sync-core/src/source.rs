use std::fs;
use std::path::{Component, Path};

use crate::error::{Error, Result};

/// Extensions accepted for diagram notation files.
pub const DIAGRAM_EXTENSIONS: &[&str] = &["mmd"];
/// Extensions accepted for descriptor sets and interchange documents.
pub const JSON_EXTENSIONS: &[&str] = &["json"];

/// Read a whole input file after rejecting empty paths, parent-directory
/// components and unexpected extensions.
pub fn read_source(path: &Path, extensions: &[&str]) -> Result<String> {
    check_path(path, extensions)?;
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn check_path(path: &Path, extensions: &[&str]) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "empty path",
        });
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "parent directory traversal",
        });
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !extensions.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)) {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "unexpected file extension",
        });
    }
    Ok(())
}
