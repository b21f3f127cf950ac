//! File system access for array files.
//!
//! Production code goes through [`RealFs`]; tests hand [`ArrayFile`] a
//! [`MockFs`] and corrupt its contents in place.
//!
//! [`ArrayFile`]: super::ArrayFile

use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Whole-file read and write.
pub trait FsProvider: Send + Sync {
    /// Read file contents.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace file contents, creating the file if needed.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Check if a file exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if this is a mock provider.
    fn is_mock(&self) -> bool;
}

/// Real filesystem provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Create a new real filesystem provider.
    pub fn new() -> Self {
        Self
    }
}

impl FsProvider for RealFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_mock(&self) -> bool {
        false
    }
}

/// In-memory file store.
///
/// # Example
///
/// ```
/// use binstack_core::file::{FsProvider, MockFs};
/// use std::path::Path;
///
/// let fs = MockFs::new().with_file("/arrays/a.bin", b"data");
/// assert!(fs.exists(Path::new("/arrays/./a.bin")));
///
/// fs.modify("/arrays/a.bin", |bytes| bytes[0] = b'D');
/// assert_eq!(fs.read(Path::new("/arrays/a.bin")).unwrap(), b"Data");
/// ```
#[derive(Debug, Default)]
pub struct MockFs {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MockFs {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Self {
        self.files
            .write()
            .insert(Self::normalize_path(path.as_ref()), contents.as_ref().to_vec());
        self
    }

    /// Edit a file's bytes in place. Returns false if the file is missing.
    pub fn modify(&self, path: impl AsRef<Path>, edit: impl FnOnce(&mut Vec<u8>)) -> bool {
        match self.files.write().get_mut(&Self::normalize_path(path.as_ref())) {
            Some(contents) => {
                edit(contents);
                true
            }
            None => false,
        }
    }

    /// Every stored path.
    pub fn all_files(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }

    /// Remove `.` and `..` components.
    fn normalize_path(path: &Path) -> PathBuf {
        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir => {}
                _ => normalized.push(component),
            }
        }
        normalized
    }
}

impl FsProvider for MockFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = Self::normalize_path(path);
        self.files.read().get(&path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )
        })
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.files
            .write()
            .insert(Self::normalize_path(path), contents.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(&Self::normalize_path(path))
    }

    fn is_mock(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fs_write_then_read() {
        let fs = MockFs::new();
        fs.write(Path::new("/a/b.bin"), b"payload").unwrap();

        assert!(fs.exists(Path::new("/a/b.bin")));
        assert!(fs.exists(Path::new("/a/c/../b.bin")));
        assert_eq!(fs.read(Path::new("/a/b.bin")).unwrap(), b"payload");
        assert!(fs.is_mock());
    }

    #[test]
    fn mock_fs_missing_file() {
        let fs = MockFs::new();
        let err = fs.read(Path::new("/nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!fs.modify("/nope", |_| {}));
    }

    #[test]
    fn real_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("real.bin");
        let fs = RealFs::new();

        assert!(!fs.exists(&path));
        fs.write(&path, b"bytes").unwrap();
        assert_eq!(fs.read(&path).unwrap(), b"bytes");
        assert!(!fs.is_mock());
    }
}
