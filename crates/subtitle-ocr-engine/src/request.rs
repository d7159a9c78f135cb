use image::GrayImage;

/// OCR invocation: a preprocessed binary image and a language hint.
#[derive(Debug, Clone, Copy)]
pub struct OcrRequest<'a> {
    image: &'a GrayImage,
    language: &'a str,
}

impl<'a> OcrRequest<'a> {
    pub fn new(image: &'a GrayImage, language: &'a str) -> Self {
        Self { image, language }
    }

    pub fn image(&self) -> &'a GrayImage {
        self.image
    }

    pub fn language(&self) -> &'a str {
        self.language
    }
}

/// Text read from one image. Empty text means nothing was recognized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: Option<f32>,
}

impl Recognition {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_confidence(mut self, value: f32) -> Self {
        self.confidence = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
