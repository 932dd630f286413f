use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Frame {index} out of range (frame count {frame_count})")]
    FrameOutOfRange { index: u64, frame_count: u64 },
    #[error("No frames found in {0}")]
    EmptySource(String),
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),
    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::core::config::ConfigError),
}
