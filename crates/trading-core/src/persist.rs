//! Write-temp-then-rename JSON persistence for the small state files the trading
//! pipeline owns (pending trades, entry criteria, Kelly history, circuit breaker
//! state). A crash mid-write can never leave a half-written file in place of the
//! real one; readers either see the old contents or the fully-written new ones.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize `value` and atomically replace the file at `path`.
///
/// Writes to a sibling `<path>.tmp` file first, then renames it over the
/// destination. On POSIX filesystems `rename` is atomic, so a reader never
/// observes a partially-written file.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PersistError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let tmp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp_path, &bytes).map_err(|source| PersistError::Io {
        path: tmp_path.display().to_string(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| PersistError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Read and deserialize JSON from `path`. Missing or corrupt files return
/// `default` rather than an error — every caller of this helper treats its
/// state file as a cache that can be safely rebuilt from scratch.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path, default: T) -> T {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Default)]
    struct Sample {
        a: i32,
        b: String,
    }

    #[test]
    fn round_trips_through_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let value = Sample {
            a: 7,
            b: "hi".into(),
        };
        atomic_write_json(&path, &value).unwrap();
        let loaded: Sample = atomic_read_json(&path, Sample::default());
        assert_eq!(loaded, value);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn missing_file_returns_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded: Sample = atomic_read_json(&path, Sample::default());
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn corrupt_file_returns_default_instead_of_panicking() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, b"not json").unwrap();
        let loaded: Sample = atomic_read_json(&path, Sample::default());
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn overwrite_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write_json(
            &path,
            &Sample {
                a: 1,
                b: "first".into(),
            },
        )
        .unwrap();
        atomic_write_json(
            &path,
            &Sample {
                a: 2,
                b: "second".into(),
            },
        )
        .unwrap();
        let loaded: Sample = atomic_read_json(&path, Sample::default());
        assert_eq!(loaded.a, 2);
        assert_eq!(loaded.b, "second");
    }
}
