use thiserror::Error;

use crate::kind::EngineKind;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("unknown OCR engine '{name}'")]
    UnknownEngine { name: String },
    #[error("{engine} engine is unavailable: {reason}")]
    Unavailable { engine: EngineKind, reason: String },
    #[error("failed to encode image for recognition: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl OcrError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn unavailable(engine: EngineKind, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            engine,
            reason: reason.into(),
        }
    }
}
