// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Filesystem operations used by the intrinsics and interpreted redirects.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Create or truncate `path` and write `contents`.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Append `contents`, creating the file if needed.
    fn append(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Names (not full paths) of the entries in a directory.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).with_context(|| format!("writing file {:?}", path))
    }

    fn append(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening file {:?} for append", path))?;
        file.write_all(contents)
            .with_context(|| format!("appending to file {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

/// Join `path` onto `base` unless it is already absolute.
pub(crate) fn resolve(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_fs_write_append_list() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        let file = tmp.path().join("a.txt");

        fs.write(&file, b"one").unwrap();
        fs.append(&file, b"two").unwrap();
        assert_eq!(fs.read_to_string(&file).unwrap(), "onetwo");

        fs.append(&tmp.path().join("b.txt"), b"new").unwrap();
        let mut names = fs.list_dir(tmp.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn real_fs_read_missing_file_has_context() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RealFileSystem
            .read_to_string(&tmp.path().join("nope"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("reading file"));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/work");
        assert_eq!(resolve(base, "x/y"), PathBuf::from("/work/x/y"));
        assert_eq!(resolve(base, "/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
