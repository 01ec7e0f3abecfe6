//! JSON snapshot files shared by all optimizers.
//!
//! Each optimizer defines its own snapshot struct (population, network, Q-table,
//! policy) and persists it through [`save_json`] / [`load_json`]. Loading is strict:
//! a missing key or a matrix whose shape does not match the stored configuration is
//! a [`SnapshotError`], and nothing is partially applied.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

/// Failure to write or read a snapshot.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SnapshotError {
    #[display("failed to access snapshot file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("malformed snapshot file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("snapshot shape mismatch: {message}")]
    Shape { message: String },
}

impl SnapshotError {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }
}

/// Writes `value` as pretty-printed JSON, replacing any existing file.
pub fn save_json<T, P>(path: P, value: &T) -> Result<(), SnapshotError>
where
    T: Serialize + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let io_error = |source| SnapshotError::Io {
        path: path.to_owned(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| SnapshotError::Json {
        path: path.to_owned(),
        source,
    })?;
    writeln!(writer).map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    Ok(())
}

/// Reads a JSON snapshot.
pub fn load_json<T, P>(path: P) -> Result<T, SnapshotError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SnapshotError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| SnapshotError::Json {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    /// A unique path in the system temp directory, removed on drop.
    pub(crate) struct TempPath(PathBuf);

    impl TempPath {
        pub(crate) fn new(name: &str) -> Self {
            static COUNTER: AtomicUsize = AtomicUsize::new(0);
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            Self(std::env::temp_dir().join(format!(
                "rpsbr-{}-{n}-{name}.json",
                std::process::id()
            )))
        }

        pub(crate) fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempPath {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempPath::new("map");
        let value = BTreeMap::from([("a".to_owned(), 0.1_f64), ("b".to_owned(), 1e-300)]);
        save_json(tmp.path(), &value).unwrap();
        let loaded: BTreeMap<String, f64> = load_json(tmp.path()).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = TempPath::new("missing");
        let err = load_json::<Vec<f64>, _>(tmp.path()).unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }

    #[test]
    fn test_malformed_file_is_json_error() {
        let tmp = TempPath::new("malformed");
        std::fs::write(tmp.path(), "{\"q_table\": [[1.0]").unwrap();
        let err = load_json::<serde_json::Value, _>(tmp.path()).unwrap_err();
        assert!(matches!(err, SnapshotError::Json { .. }));
    }
}
