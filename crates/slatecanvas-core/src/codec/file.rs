//! Reading and writing `.slatecanvas` files.

use super::{BoardSnapshot, DecodeError, FILE_EXTENSION, decode, encode_snapshot};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name given to imported boards that carry no name.
pub const IMPORTED_BOARD_NAME: &str = "Imported Slate";

/// File errors.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid file format: {0}")]
    InvalidFormat(#[from] DecodeError),
}

/// File name for a board: ASCII letters and digits kept and lowercased,
/// anything else replaced by `_`.
pub fn file_name_for(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let stem = if safe.is_empty() { "untitled" } else { safe.as_str() };
    format!("{stem}.{FILE_EXTENSION}")
}

/// Write a board to `path` in the current format.
pub fn export_to_file(path: &Path, snapshot: &BoardSnapshot) -> Result<(), FileError> {
    let bytes = encode_snapshot(snapshot);
    fs::write(path, &bytes).map_err(|source| FileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!(
        "wrote board {} ({} elements, {} bytes) to {}",
        snapshot.id,
        snapshot.elements.len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

/// Write a board into `dir` under [`file_name_for`] its name.
pub fn export_into(dir: &Path, snapshot: &BoardSnapshot) -> Result<PathBuf, FileError> {
    let path = dir.join(file_name_for(&snapshot.name));
    export_to_file(&path, snapshot)?;
    Ok(path)
}

/// Read and decode a whole board file. Nothing is returned unless the
/// entire file decodes.
pub fn import_from_file(path: &Path) -> Result<BoardSnapshot, FileError> {
    let bytes = fs::read(path).map_err(|source| FileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut snapshot = decode(&bytes)?;
    if snapshot.name.trim().is_empty() {
        snapshot.name = IMPORTED_BOARD_NAME.to_string();
    }
    log::info!(
        "read board {} ({} elements) from {}",
        snapshot.id,
        snapshot.elements.len(),
        path.display()
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use kurbo::Point;
    use tempfile::tempdir;

    #[test]
    fn test_file_name_sanitized() {
        assert_eq!(file_name_for("Sprint Plan #4"), "sprint_plan__4.slatecanvas");
        assert_eq!(file_name_for(""), "untitled.slatecanvas");
        assert_eq!(file_name_for("Café"), "caf_.slatecanvas");
    }

    #[test]
    fn test_export_import_file() {
        let dir = tempdir().unwrap();
        let snapshot = BoardSnapshot {
            id: "board".to_string(),
            name: "Retro".to_string(),
            elements: vec![Element::rectangle(Point::new(1.0, 2.0), 3.0, 4.0)],
        };
        let path = export_into(dir.path(), &snapshot).unwrap();
        assert!(path.ends_with("retro.slatecanvas"));
        assert_eq!(import_from_file(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_import_names_unnamed_board() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blank.slatecanvas");
        let snapshot = BoardSnapshot {
            id: "board".to_string(),
            name: String::new(),
            elements: Vec::new(),
        };
        export_to_file(&path, &snapshot).unwrap();
        assert_eq!(import_from_file(&path).unwrap().name, IMPORTED_BOARD_NAME);
    }

    #[test]
    fn test_import_garbage_is_invalid_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.slatecanvas");
        fs::write(&path, [0xff, 0xff, 0xff]).unwrap();
        let err = import_from_file(&path).unwrap_err();
        assert!(matches!(err, FileError::InvalidFormat(_)));
        assert!(err.to_string().starts_with("invalid file format"));
    }

    #[test]
    fn test_import_missing_file() {
        let dir = tempdir().unwrap();
        let result = import_from_file(&dir.path().join("nope.slatecanvas"));
        assert!(matches!(result, Err(FileError::Io { .. })));
    }
}
