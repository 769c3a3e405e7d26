use std::path::PathBuf;

use thiserror::Error;

pub type SkyboxResult<T> = Result<T, SkyboxError>;

#[derive(Error, Debug)]
pub enum SkyboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid depth map: {0}")]
    InvalidDepthMap(String),

    #[error("missing asset: {0:?}")]
    MissingAsset(PathBuf),

    #[error("build task failed: {0}")]
    Task(String),
}
