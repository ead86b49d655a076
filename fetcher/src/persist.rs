/// JSON array file persistence
/// Appends ABI records to a JSON array on disk with read-modify-write

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Error reading file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error writing file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Current contents of the array file. A missing file, unreadable content or
/// anything other than a JSON array all count as empty.
pub fn load_entries(path: &Path) -> Vec<Value> {
    match read_entries(path) {
        Ok(entries) => entries,
        Err(e) => {
            error!("{}", e);
            Vec::new()
        }
    }
}

fn read_entries(path: &Path) -> Result<Vec<Value>, PersistError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(PersistError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(entries)) => Ok(entries),
        Ok(_) => {
            warn!(path = %path.display(), "Existing file is not a JSON array, starting over");
            Ok(Vec::new())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Existing file is not valid JSON, starting over");
            Ok(Vec::new())
        }
    }
}

/// Append one entry, returning the new array length.
///
/// A file that exists but cannot be read is left untouched and the write is
/// aborted with [`PersistError::Read`].
pub fn try_append<T: Serialize>(path: &Path, entry: &T) -> Result<usize, PersistError> {
    let value = serde_json::to_value(entry)?;

    let mut entries = read_entries(path)?;
    entries.push(value);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PersistError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let serialized = serde_json::to_string(&entries)?;
    fs::write(path, serialized).map_err(|source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), entries = entries.len(), "Entry appended");
    Ok(entries.len())
}

/// Append one entry, logging instead of failing. Returns whether it was written.
pub fn append<T: Serialize>(path: &Path, entry: &T) -> bool {
    match try_append(path, entry) {
        Ok(_) => true,
        Err(e) => {
            error!("{}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use move_abi::{AbiEntry, AbiParam, EntryKind};
    use tempfile::tempdir;

    fn entry(i: usize) -> AbiEntry {
        AbiEntry {
            name: format!("m::f{}", i),
            kind: EntryKind::Function,
            inputs: vec![AbiParam::new("Arg0", "uint64")],
            outputs: Some(vec![AbiParam::new("result0", "bool")]),
        }
    }

    #[test]
    fn test_sequential_appends_accumulate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0x2_abi.json");

        for i in 0..4 {
            assert_eq!(try_append(&path, &entry(i)).unwrap(), i + 1);
        }

        let stored: Vec<AbiEntry> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, (0..4).map(entry).collect::<Vec<_>>());
    }

    #[test]
    fn test_corrupt_file_is_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();

        assert_eq!(try_append(&path, &entry(0)).unwrap(), 1);
        assert_eq!(load_entries(&path).len(), 1);
    }

    #[test]
    fn test_non_array_file_is_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("object.json");
        fs::write(&path, r#"{"name": "x"}"#).unwrap();

        assert_eq!(try_append(&path, &entry(0)).unwrap(), 1);
    }

    #[test]
    fn test_unreadable_file_aborts_the_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0x2_abi.json");
        let mut original = br#"[{"name":"keep"},"#.to_vec();
        original.extend_from_slice(&[0xff, 0xfe, b']']);
        fs::write(&path, &original).unwrap();

        assert!(matches!(
            try_append(&path, &entry(0)),
            Err(PersistError::Read { .. })
        ));
        assert!(!append(&path, &entry(0)));
        assert_eq!(fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_missing_parent_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out").join("0xdee9_abi.json");

        assert!(append(&path, &entry(0)));
        assert!(path.exists());
    }

    #[test]
    fn test_write_failure_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        // A directory where the file should be.
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();

        assert!(!append(&path, &entry(0)));
        assert!(matches!(
            try_append(&path, &entry(0)),
            Err(PersistError::Write { .. })
        ));
    }
}
