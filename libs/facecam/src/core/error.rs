// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Asset error: {0}")]
    Asset(String),

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Frame converter error: {0}")]
    Converter(String),

    #[error("Render context '{0}' is already owned by a live converter")]
    ContextBusy(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Display surface error: {0}")]
    Surface(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PreviewError>;
