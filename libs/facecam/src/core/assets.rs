// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Bundled resource access for the processing engine.

use std::path::{Path, PathBuf};

use crate::core::{PreviewError, Result};

pub trait AssetSource: Send {
    /// Expose bundled resources to the processing engine. Calls after the
    /// first successful one are no-ops.
    fn initialize(&mut self) -> Result<()>;

    /// Location of a bundled resource by file name.
    fn resolve(&self, name: &str) -> Result<PathBuf>;
}

/// Resources compiled into the host; names resolve to themselves.
#[derive(Debug, Default)]
pub struct BundledAssets {
    initialized: bool,
}

impl AssetSource for BundledAssets {
    fn initialize(&mut self) -> Result<()> {
        if !self.initialized {
            self.initialized = true;
            tracing::debug!("Using bundled assets");
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(PathBuf::from(name))
    }
}

/// Resources read from a directory on disk.
#[derive(Debug)]
pub struct DirectoryAssets {
    root: PathBuf,
    initialized: bool,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirectoryAssets {
    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if !self.root.is_dir() {
            return Err(PreviewError::Asset(format!(
                "Asset directory {} does not exist",
                self.root.display()
            )));
        }
        self.initialized = true;
        tracing::info!("Initialized assets from {}", self.root.display());
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if !self.initialized {
            return Err(PreviewError::FailedPrecondition(
                "assets must be initialized before use".to_string(),
            ));
        }
        validate_name(name)?;

        let path = self.root.join(name);
        if !path.is_file() {
            return Err(PreviewError::Asset(format!(
                "Asset '{}' not found in {}",
                name,
                self.root.display()
            )));
        }
        Ok(path)
    }
}

/// Asset names are bare file names.
fn validate_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let plain = path.components().count() == 1 && path.file_name().is_some_and(|f| f == name);
    if name.is_empty() || !plain {
        return Err(PreviewError::InvalidArgument(format!(
            "Asset name '{}' must be a plain file name",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_assets_resolve_graph() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("graph.binarypb"), b"graph").unwrap();

        let mut assets = DirectoryAssets::new(dir.path());
        assets.initialize().unwrap();
        assets.initialize().unwrap();

        let path = assets.resolve("graph.binarypb").unwrap();
        assert_eq!(path, dir.path().join("graph.binarypb"));
        assert!(matches!(assets.resolve("missing.binarypb"), Err(PreviewError::Asset(_))));
    }

    #[test]
    fn test_resolve_requires_initialize() {
        let dir = TempDir::new().unwrap();
        let assets = DirectoryAssets::new(dir.path());
        assert!(matches!(
            assets.resolve("graph.binarypb"),
            Err(PreviewError::FailedPrecondition(_))
        ));
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let mut assets = DirectoryAssets::new(dir.path().join("nope"));
        assert!(matches!(assets.initialize(), Err(PreviewError::Asset(_))));
    }

    #[test]
    fn test_names_with_paths_rejected() {
        let assets = BundledAssets::default();
        assert!(assets.resolve("../secret").is_err());
        assert!(assets.resolve("dir/graph.binarypb").is_err());
        assert!(assets.resolve("").is_err());
        assert!(assets.resolve("graph.binarypb").is_ok());
    }
}
