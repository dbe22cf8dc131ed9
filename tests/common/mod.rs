//! Shared test utilities

use murmur::ModelCatalog;

/// Set up a temporary models directory with the given stub files
#[must_use]
pub fn setup_catalog(files: &[&str]) -> (tempfile::TempDir, ModelCatalog) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    for f in files {
        std::fs::write(tmp.path().join(f), b"stub").expect("failed to write stub model");
    }
    let catalog = ModelCatalog::new(tmp.path()).expect("failed to create catalog");
    (tmp, catalog)
}
