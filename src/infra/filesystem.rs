//! Filesystem operations
//!
//! Thin wrappers that attach the offending path to every I/O failure.

use std::io::Write;
use std::path::Path;

use crate::error::StorageError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Replace a file's content atomically
///
/// Content is written to a temporary file in the same directory and renamed
/// over `path`, so readers see either the old or the new content.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    create_dir_all(parent)?;

    let write_err = |e: std::io::Error| StorageError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(content).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Read a file as UTF-8
pub fn read_file(path: &Path) -> Result<String, StorageError> {
    std::fs::read_to_string(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read a file as bytes
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, StorageError> {
    std::fs::read(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a file, returning whether it existed
pub fn remove_file(path: &Path) -> Result<bool, StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::RemoveFile {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}

/// Make a file readable by its owner only
#[cfg(unix)]
pub fn restrict_to_owner(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
        StorageError::WriteFile {
            path: path.to_path_buf(),
            error: e.to_string(),
        }
    })
}

/// Make a file readable by its owner only
#[cfg(not(unix))]
pub fn restrict_to_owner(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}
