// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Preview configuration via `facecam.yaml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::bridge::DEFAULT_BUFFER_COUNT;
use crate::core::facing::CameraFacing;
use crate::core::processor::GraphConfig;
use crate::core::sources::SyntheticCameraConfig;
use crate::core::{PreviewError, Result};

/// Preview configuration from `facecam.yaml`. Every field is optional in the
/// file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Processing graph and its stream tags.
    pub graph: GraphConfig,

    /// Facing used for the first camera start.
    pub initial_facing: CameraFacing,

    /// Frames the converter may hold while the processor is busy.
    pub converter_buffers: usize,

    /// Flip frames vertically in the converter and on the processor output.
    pub flip_y: bool,

    /// Directory holding the graph file. Bundled assets when unset.
    pub asset_dir: Option<PathBuf>,

    /// Label of the shared render context.
    pub context_label: String,

    /// Synthetic camera used by the runtime.
    pub camera: SyntheticCameraConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            initial_facing: CameraFacing::Front,
            converter_buffers: DEFAULT_BUFFER_COUNT,
            flip_y: true,
            asset_dir: None,
            context_label: "preview".to_string(),
            camera: SyntheticCameraConfig::default(),
        }
    }
}

impl PreviewConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "facecam.yaml";

    /// Load configuration from a directory. Returns error if the file is
    /// missing, cannot be parsed, or fails validation.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::from_file(&dir.join(Self::FILE_NAME))
    }

    pub fn from_file(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            PreviewError::Configuration(format!("Failed to read {}: {}", config_path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            PreviewError::Configuration(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
        config.validate()?;

        tracing::info!("Loaded preview config from {}", config_path.display());
        Ok(config)
    }

    /// Load configuration from a directory, returning defaults if the file is
    /// missing or unusable.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                dir.display()
            );
            return Self::default();
        }

        match Self::from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.graph.validate()?;
        self.camera.validate()?;
        if self.converter_buffers == 0 {
            return Err(PreviewError::Configuration(
                "converter_buffers must be at least 1".to_string(),
            ));
        }
        if self.context_label.trim().is_empty() {
            return Err(PreviewError::Configuration(
                "context_label must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
