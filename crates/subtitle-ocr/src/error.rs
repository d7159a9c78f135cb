use std::path::PathBuf;

use subtitle_ocr_engine::OcrError;
use subtitle_ocr_vision::VisionError;
use thiserror::Error;

/// Failure that ends a task. Reported once as a `Failed` event.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("failed to open video {}: {reason}", .path.display())]
    VideoOpen { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl TaskError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn video_open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::VideoOpen {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failure confined to one sampled frame; the frame is skipped.
#[derive(Debug, Error)]
pub enum FrameExtractionError {
    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] VisionError),

    #[error("recognition failed: {0}")]
    Recognition(#[from] OcrError),
}
