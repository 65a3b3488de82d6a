//! Durable storage for received files.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Writes received files into a fixed directory, created on first use.
///
/// Only the base name of a transfer name is honored; directory components in
/// a forwarded name are stripped so a hostile peer cannot traverse out of the
/// store.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `data` under the base name of `name`. Returns the final path.
    pub fn save(&self, name: &str, data: &[u8]) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let base = Path::new(name).file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("transfer name {name:?} has no file name"),
            )
        })?;
        let path = self.dir.join(base);
        std::fs::write(&path, data)?;
        debug!(path = %path.display(), bytes = data.len(), "wrote file");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_creates_the_directory() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("nested").join("deep"));
        let path = store.save("report.txt", b"hello").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }

    #[test]
    fn save_strips_directory_components() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf());
        let path = store.save("../../etc/passwd", b"oops").unwrap();
        assert_eq!(path, tmp.path().join("passwd"));
        assert!(!tmp.path().join("..").join("etc").join("passwd").exists());
    }

    #[test]
    fn save_accepts_empty_data() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf());
        let path = store.save("empty.bin", b"").unwrap();
        assert_eq!(std::fs::metadata(path).unwrap().len(), 0);
    }

    #[test]
    fn save_rejects_a_name_with_no_file_name() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf());
        assert!(store.save("..", b"x").is_err());
    }
}
