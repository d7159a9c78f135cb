use std::path::PathBuf;

use crate::backends::tesseract::TesseractEngine;
use crate::error::OcrError;
use crate::kind::EngineKind;
use crate::request::{OcrRequest, Recognition};

/// Common interface for all OCR engines.
///
/// Engines may keep mutable per-language state, so a handle is owned by a
/// single worker and never shared between threads.
pub trait OcrEngine: Send {
    fn kind(&self) -> EngineKind;

    fn warm_up(&mut self) -> Result<(), OcrError> {
        Ok(())
    }

    /// Loads whatever the engine needs for `language` before a task starts.
    fn prepare_language(&mut self, _language: &str) -> Result<(), OcrError> {
        Ok(())
    }

    fn extract(&mut self, request: &OcrRequest<'_>) -> Result<Recognition, OcrError>;
}

/// Builds engine handles and reports whether an engine can run here.
pub trait EngineFactory: Send {
    fn ensure_available(&self, kind: EngineKind) -> Result<(), OcrError>;

    fn create(&self, kind: EngineKind) -> Result<Box<dyn OcrEngine>, OcrError>;
}

/// Locations of the external resources each engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub tesseract_binary: PathBuf,
    pub onnx_model_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tesseract_binary: PathBuf::from("tesseract"),
            onnx_model_dir: None,
        }
    }
}

impl EngineSettings {
    /// Availability of every known engine, in declaration order.
    pub fn probe(&self) -> Vec<(EngineKind, Result<(), OcrError>)> {
        EngineKind::ALL
            .iter()
            .map(|&kind| (kind, self.ensure_available(kind)))
            .collect()
    }

    #[cfg(feature = "engine-onnx")]
    fn onnx_model_dir(&self) -> Result<&std::path::Path, OcrError> {
        let dir = self.onnx_model_dir.as_deref().ok_or_else(|| {
            OcrError::unavailable(EngineKind::Onnx, "no model directory configured")
        })?;
        if !dir.is_dir() {
            return Err(OcrError::unavailable(
                EngineKind::Onnx,
                format!("model directory {} does not exist", dir.display()),
            ));
        }
        Ok(dir)
    }
}

impl EngineFactory for EngineSettings {
    fn ensure_available(&self, kind: EngineKind) -> Result<(), OcrError> {
        match kind {
            EngineKind::Tesseract => TesseractEngine::check_binary(&self.tesseract_binary),
            EngineKind::Onnx => {
                #[cfg(feature = "engine-onnx")]
                {
                    self.onnx_model_dir().map(|_| ())
                }
                #[cfg(not(feature = "engine-onnx"))]
                {
                    Err(OcrError::unavailable(
                        EngineKind::Onnx,
                        "built without the engine-onnx feature",
                    ))
                }
            }
        }
    }

    fn create(&self, kind: EngineKind) -> Result<Box<dyn OcrEngine>, OcrError> {
        self.ensure_available(kind)?;
        match kind {
            EngineKind::Tesseract => Ok(Box::new(TesseractEngine::new(
                self.tesseract_binary.clone(),
            ))),
            EngineKind::Onnx => {
                #[cfg(feature = "engine-onnx")]
                {
                    let dir = self.onnx_model_dir()?;
                    Ok(Box::new(crate::backends::onnx::OnnxOcrEngine::new(
                        dir.to_path_buf(),
                    )?))
                }
                #[cfg(not(feature = "engine-onnx"))]
                {
                    Err(OcrError::unavailable(
                        EngineKind::Onnx,
                        "built without the engine-onnx feature",
                    ))
                }
            }
        }
    }
}
