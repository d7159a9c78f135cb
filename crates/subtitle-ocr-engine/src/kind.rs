use std::fmt;
use std::str::FromStr;

use crate::error::OcrError;

// Two-letter and three-letter codes for the same language.
const LANGUAGE_PAIRS: [(&str, &str); 8] = [
    ("en", "eng"),
    ("ru", "rus"),
    ("de", "deu"),
    ("fr", "fra"),
    ("es", "spa"),
    ("it", "ita"),
    ("uk", "ukr"),
    ("pl", "pol"),
];

const TESSERACT_LANGUAGES: [&str; 8] = ["eng", "rus", "deu", "fra", "spa", "ita", "ukr", "pol"];
const ONNX_LANGUAGES: [&str; 6] = ["en", "ru", "de", "fr", "es", "it"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineKind {
    Tesseract,
    Onnx,
}

impl EngineKind {
    pub const ALL: [EngineKind; 2] = [EngineKind::Tesseract, EngineKind::Onnx];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Tesseract => "tesseract",
            EngineKind::Onnx => "onnx",
        }
    }

    /// Language codes this engine understands.
    pub fn languages(&self) -> &'static [&'static str] {
        match self {
            EngineKind::Tesseract => &TESSERACT_LANGUAGES,
            EngineKind::Onnx => &ONNX_LANGUAGES,
        }
    }

    /// Maps a free-form language hint onto this engine's vocabulary.
    ///
    /// Hints are trimmed and lowercased, translated between two- and
    /// three-letter forms, and fall back to English when unknown.
    pub fn language_code(&self, hint: &str) -> &'static str {
        self.resolve_language(hint).unwrap_or(self.languages()[0])
    }

    /// Like [`EngineKind::language_code`] but `None` for unknown hints.
    pub fn resolve_language(&self, hint: &str) -> Option<&'static str> {
        let hint = hint.trim().to_ascii_lowercase();
        let vocabulary = self.languages();
        if let Some(code) = vocabulary.iter().find(|code| **code == hint) {
            return Some(*code);
        }
        let translated = LANGUAGE_PAIRS.iter().find_map(|(short, long)| {
            if *short == hint {
                Some(*long)
            } else if *long == hint {
                Some(*short)
            } else {
                None
            }
        });
        translated
            .and_then(|candidate| vocabulary.iter().find(|code| **code == candidate))
            .copied()
    }
}

impl FromStr for EngineKind {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(EngineKind::Tesseract),
            "onnx" | "easyocr" => Ok(EngineKind::Onnx),
            other => Err(OcrError::UnknownEngine {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
