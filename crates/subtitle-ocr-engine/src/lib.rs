mod backends;
pub mod detections;
mod engine;
mod error;
mod kind;
mod request;

#[cfg(feature = "engine-onnx")]
pub use backends::onnx::OnnxOcrEngine;
pub use backends::tesseract::TesseractEngine;
pub use engine::{EngineFactory, EngineSettings, OcrEngine};
pub use error::OcrError;
pub use kind::EngineKind;
pub use request::{OcrRequest, Recognition};
pub use subtitle_ocr_types::{OcrRegion, OcrResponse, OcrText};
