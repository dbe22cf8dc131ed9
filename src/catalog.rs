//! Model file discovery
//!
//! Models live in a single directory scanned for `.gguf` files. The
//! directory is created on first use so a fresh checkout works without
//! setup.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// File extension recognized as a loadable model
const MODEL_EXTENSION: &str = "gguf";

/// Scans a directory for loadable model files
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    dir: PathBuf,
}

impl ModelCatalog {
    /// Create a catalog over the given directory, creating it if absent
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            tracing::info!(path = %dir.display(), "created models directory");
        }
        Ok(Self { dir })
    }

    /// The directory this catalog scans
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List model file names (not paths), sorted
    ///
    /// Subdirectories and files with other extensions are ignored.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| {
                Path::new(name)
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(MODEL_EXTENSION))
            })
            .collect();

        names.sort();
        names
    }

    /// Resolve a listed file name to its full path
    ///
    /// # Errors
    ///
    /// Returns error if the name is not a plain file name or is not present
    /// in the directory
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || Path::new(name).file_name() != Some(std::ffi::OsStr::new(name)) {
            return Err(Error::Catalog(format!("invalid model name: {name}")));
        }

        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(Error::Catalog(format!("model not found: {name}")));
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with(files: &[&str]) -> (tempfile::TempDir, ModelCatalog) {
        let tmp = tempfile::tempdir().unwrap();
        for f in files {
            std::fs::write(tmp.path().join(f), b"stub").unwrap();
        }
        let catalog = ModelCatalog::new(tmp.path()).unwrap();
        (tmp, catalog)
    }

    #[test]
    fn test_creates_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("models");
        assert!(!dir.exists());

        let catalog = ModelCatalog::new(&dir).unwrap();
        assert!(dir.exists());
        assert!(catalog.list().is_empty());
    }

    #[test]
    fn test_lists_only_gguf_sorted() {
        let (_tmp, catalog) = catalog_with(&["b.gguf", "a.gguf", "readme.txt", "c.bin"]);
        assert_eq!(catalog.list(), vec!["a.gguf", "b.gguf"]);
    }

    #[test]
    fn test_ignores_subdirectories() {
        let (tmp, catalog) = catalog_with(&["model.gguf"]);
        std::fs::create_dir(tmp.path().join("nested.gguf")).unwrap();
        assert_eq!(catalog.list(), vec!["model.gguf"]);
    }

    #[test]
    fn test_path_of_known_model() {
        let (tmp, catalog) = catalog_with(&["model.gguf"]);
        let path = catalog.path_of("model.gguf").unwrap();
        assert_eq!(path, tmp.path().join("model.gguf"));
    }

    #[test]
    fn test_path_of_rejects_unknown_and_traversal() {
        let (_tmp, catalog) = catalog_with(&["model.gguf"]);
        assert!(catalog.path_of("missing.gguf").is_err());
        assert!(catalog.path_of("../model.gguf").is_err());
        assert!(catalog.path_of("").is_err());
    }
}
