//! Writing generated headers

use checkgen_common::GeneratorError;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

fn io_error(action: &str, path: &Path, err: io::Error) -> GeneratorError {
    GeneratorError::IoError {
        message: format!("cannot {} '{}': {}", action, path.display(), err),
    }
}

/// Whether `path` already holds exactly `contents`
pub fn is_up_to_date(path: &Path, contents: &str) -> Result<bool, GeneratorError> {
    match fs::read_to_string(path) {
        Ok(existing) => Ok(existing == contents),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_error("read", path, err)),
    }
}

/// Replace `path` with `contents`. The text is written to a temporary file
/// next to `path` first, so readers never observe a partial header.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), GeneratorError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(|e| io_error("create a temporary file in", dir, e))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| io_error("write", file.path(), e))?;
    file.persist(path).map_err(|e| io_error("replace", path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_checked.h");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_checked.h");
        assert!(!is_up_to_date(&path, "text").unwrap());

        fs::write(&path, "text").unwrap();
        assert!(is_up_to_date(&path, "text").unwrap());
        assert!(!is_up_to_date(&path, "other").unwrap());
    }

    #[test]
    fn test_missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("api_checked.h");
        assert!(matches!(write_atomic(&path, "text"), Err(GeneratorError::IoError { .. })));
        assert!(!path.exists());
    }
}
