//! ONNX Runtime line recognizer.
//!
//! The binary input is split into ink bands, each band is resized to the
//! model input and decoded with greedy CTC. Models live in one directory as
//! `rec_<language>.onnx`, with an optional `rec_<language>.txt` alphabet
//! holding one symbol per line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::GrayImage;
use ndarray::{Array4, CowArray, IxDyn};
use once_cell::sync::OnceCell;
use ort::environment::Environment;
use ort::error::OrtError;
use ort::session::{Session, SessionBuilder};
use ort::value::Value;

use crate::detections::{MIN_LINE_CONFIDENCE, band_region, join_confident, split_lines};
use crate::{EngineKind, OcrEngine, OcrError, OcrRequest, OcrText, Recognition};

const INPUT_HEIGHT: usize = 48;
const INPUT_WIDTH: usize = 320;

#[derive(Debug)]
struct ModelHandle {
    _environment: Arc<Environment>,
    session: Session,
}

struct ModelRegistry {
    environment: Arc<Environment>,
    handles: Mutex<HashMap<PathBuf, Arc<ModelHandle>>>,
}

impl ModelRegistry {
    fn new() -> Result<Self, OcrError> {
        let environment = Environment::builder()
            .with_name("subtitle-ocr-engine")
            .build()
            .map_err(map_environment_error)?;
        Ok(Self {
            environment: Arc::new(environment),
            handles: Mutex::new(HashMap::new()),
        })
    }

    fn get(&self, path: &Path) -> Result<Arc<ModelHandle>, OcrError> {
        let mut guard = self
            .handles
            .lock()
            .map_err(|_| OcrError::backend("onnx model registry poisoned"))?;
        if let Some(handle) = guard.get(path) {
            return Ok(handle.clone());
        }

        let session = SessionBuilder::new(&self.environment)
            .map_err(map_session_error)?
            .with_model_from_file(path)
            .map_err(map_session_error)?;

        let handle = Arc::new(ModelHandle {
            _environment: Arc::clone(&self.environment),
            session,
        });
        guard.insert(path.to_path_buf(), handle.clone());
        Ok(handle)
    }
}

static MODEL_REGISTRY: OnceCell<ModelRegistry> = OnceCell::new();

fn registry() -> Result<&'static ModelRegistry, OcrError> {
    MODEL_REGISTRY.get_or_try_init(ModelRegistry::new)
}

struct LanguageModel {
    model: Arc<ModelHandle>,
    alphabet: Vec<char>,
}

pub struct OnnxOcrEngine {
    model_dir: PathBuf,
    languages: HashMap<&'static str, LanguageModel>,
}

impl OnnxOcrEngine {
    pub fn new(model_dir: PathBuf) -> Result<Self, OcrError> {
        if !model_dir.is_dir() {
            return Err(OcrError::unavailable(
                EngineKind::Onnx,
                format!("model directory {} does not exist", model_dir.display()),
            ));
        }
        Ok(Self {
            model_dir,
            languages: HashMap::new(),
        })
    }

    /// Languages whose `rec_<code>.onnx` model is present in the directory.
    pub fn installed_languages(&self) -> Vec<&'static str> {
        EngineKind::Onnx
            .languages()
            .iter()
            .copied()
            .filter(|code| self.model_path(code).is_file())
            .collect()
    }

    fn model_path(&self, code: &str) -> PathBuf {
        self.model_dir.join(format!("rec_{code}.onnx"))
    }

    fn language_model(&mut self, code: &'static str) -> Result<&LanguageModel, OcrError> {
        if !self.languages.contains_key(code) {
            let model_path = self.model_path(code);
            if !model_path.is_file() {
                return Err(OcrError::unavailable(
                    EngineKind::Onnx,
                    format!("no model for language '{code}' ({})", model_path.display()),
                ));
            }
            let model = registry()?.get(&model_path)?;
            let alphabet_path = self.model_dir.join(format!("rec_{code}.txt"));
            let alphabet = if alphabet_path.exists() {
                load_alphabet(&alphabet_path)?
            } else {
                default_alphabet()
            };
            self.languages
                .insert(code, LanguageModel { model, alphabet });
        }
        self.languages
            .get(code)
            .ok_or_else(|| OcrError::backend(format!("no model loaded for language {code}")))
    }
}

impl OcrEngine for OnnxOcrEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Onnx
    }

    fn warm_up(&mut self) -> Result<(), OcrError> {
        if self.installed_languages().is_empty() {
            return Err(OcrError::unavailable(
                EngineKind::Onnx,
                format!("no rec_*.onnx models in {}", self.model_dir.display()),
            ));
        }
        Ok(())
    }

    fn prepare_language(&mut self, language: &str) -> Result<(), OcrError> {
        let code = EngineKind::Onnx.language_code(language);
        self.language_model(code).map(|_| ())
    }

    fn extract(&mut self, request: &OcrRequest<'_>) -> Result<Recognition, OcrError> {
        let image = request.image();
        let code = EngineKind::Onnx.language_code(request.language());
        let language = self.language_model(code)?;
        let mut texts = Vec::new();
        for band in split_lines(image) {
            let roi = extract_band(image, band);
            let width = image.width() as usize;
            let height = (band.1 - band.0) as usize;
            let resized = resize_with_padding(&roi, width, height, INPUT_WIDTH, INPUT_HEIGHT);
            let input = prepare_input_tensor(&resized, INPUT_WIDTH, INPUT_HEIGHT)?;
            let (data, shape) = run_model(&language.model.session, &input)?;
            let (text, confidence) = decode_sequence(&data, &shape, &language.alphabet)?;
            if text.trim().is_empty() {
                continue;
            }
            let mut entry = OcrText::new(band_region(image, band), text);
            if let Some(conf) = confidence {
                entry = entry.with_confidence(conf);
            }
            texts.push(entry);
        }
        Ok(join_confident(&texts, MIN_LINE_CONFIDENCE))
    }
}

fn run_model(session: &Session, input: &Array4<f32>) -> Result<(Vec<f32>, Vec<usize>), OcrError> {
    let allocator = session.allocator();
    let input_dyn: CowArray<'_, f32, IxDyn> = CowArray::from(input.view().into_dyn());
    let tensor = Value::from_array(allocator, &input_dyn).map_err(map_input_error)?;
    let outputs = session.run(vec![tensor]).map_err(map_inference_error)?;
    let tensor = outputs
        .into_iter()
        .next()
        .ok_or_else(|| OcrError::backend("onnx model produced no output"))?
        .try_extract::<f32>()
        .map_err(map_inference_error)?;
    let view = tensor.view();
    let shape = view.shape().to_vec();
    let data = view.iter().copied().collect::<Vec<f32>>();
    Ok((data, shape))
}

fn extract_band(image: &GrayImage, band: (u32, u32)) -> Vec<u8> {
    let width = image.width() as usize;
    let start = band.0 as usize * width;
    let end = band.1 as usize * width;
    image.as_raw()[start..end].to_vec()
}

fn load_alphabet(path: &Path) -> Result<Vec<char>, OcrError> {
    let contents = std::fs::read_to_string(path)?;
    let alphabet: Vec<char> = contents
        .lines()
        .map(|line| line.chars().next().unwrap_or(' '))
        .collect();
    if alphabet.is_empty() {
        return Err(OcrError::backend(format!(
            "alphabet file {} is empty",
            path.display()
        )));
    }
    Ok(alphabet)
}

fn map_environment_error(err: OrtError) -> OcrError {
    map_schema_conflict(err, "failed to initialise ONNX runtime environment")
}

fn map_session_error(err: OrtError) -> OcrError {
    map_schema_conflict(err, "failed to load ONNX model")
}

fn map_input_error(err: OrtError) -> OcrError {
    OcrError::backend(format!("failed to prepare ONNX input: {err}"))
}

fn map_inference_error(err: OrtError) -> OcrError {
    OcrError::backend(format!("ONNX inference failed: {err}"))
}

fn map_schema_conflict(err: OrtError, context: &str) -> OcrError {
    let message = err.to_string();
    if message.contains("Trying to register schema with name") {
        OcrError::backend(format!(
            "{context}: detected ONNX Runtime schema registration conflict ({message})"
        ))
    } else {
        OcrError::backend(format!("{context}: {message}"))
    }
}

fn resize_with_padding(
    src: &[u8],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<f32> {
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return vec![0.0; dst_width * dst_height];
    }
    let mut scaled_width =
        ((dst_height as f32 / src_height as f32) * src_width as f32).round() as usize;
    scaled_width = scaled_width.clamp(1, dst_width);
    let resized = resize_bilinear(src, src_width, src_height, scaled_width, dst_height);
    let mut canvas = vec![0.0f32; dst_width * dst_height];
    for row in 0..dst_height {
        let dst_row = &mut canvas[row * dst_width..(row + 1) * dst_width];
        let src_row = &resized[row * scaled_width..(row + 1) * scaled_width];
        dst_row[..scaled_width].copy_from_slice(src_row);
    }
    canvas
}

fn resize_bilinear(
    src: &[u8],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<f32> {
    if dst_width == 0 || dst_height == 0 {
        return Vec::new();
    }
    let mut out = vec![0.0f32; dst_width * dst_height];
    let scale_x = if dst_width > 1 {
        (src_width - 1) as f32 / (dst_width - 1) as f32
    } else {
        0.0
    };
    let scale_y = if dst_height > 1 {
        (src_height - 1) as f32 / (dst_height - 1) as f32
    } else {
        0.0
    };

    for dy in 0..dst_height {
        let fy = scale_y * dy as f32;
        let y0 = fy.floor() as usize;
        let y1 = (y0 + 1).min(src_height - 1);
        let wy = fy - y0 as f32;
        for dx in 0..dst_width {
            let fx = scale_x * dx as f32;
            let x0 = fx.floor() as usize;
            let x1 = (x0 + 1).min(src_width - 1);
            let wx = fx - x0 as f32;

            let top_left = src[y0 * src_width + x0] as f32;
            let top_right = src[y0 * src_width + x1] as f32;
            let bottom_left = src[y1 * src_width + x0] as f32;
            let bottom_right = src[y1 * src_width + x1] as f32;

            let top = top_left + (top_right - top_left) * wx;
            let bottom = bottom_left + (bottom_right - bottom_left) * wx;
            let value = top + (bottom - top) * wy;
            out[dy * dst_width + dx] = (value / 255.0).clamp(0.0, 1.0);
        }
    }
    out
}

fn prepare_input_tensor(
    normalized: &[f32],
    width: usize,
    height: usize,
) -> Result<Array4<f32>, OcrError> {
    if normalized.len() != width * height {
        return Err(OcrError::backend(
            "normalized image has unexpected length for ONNX input",
        ));
    }
    let mut data = vec![0.0f32; normalized.len() * 3];
    let area = width * height;
    for i in 0..area {
        let value = normalized[i];
        data[i] = value;
        data[i + area] = value;
        data[i + 2 * area] = value;
    }
    Array4::from_shape_vec((1, 3, height, width), data)
        .map_err(|err| OcrError::backend(format!("failed to build ONNX input tensor: {err}")))
}

fn decode_sequence(
    data: &[f32],
    shape: &[usize],
    alphabet: &[char],
) -> Result<(String, Option<f32>), OcrError> {
    let mut dims: Vec<usize> = shape.to_vec();
    while dims.len() > 2 && dims.first() == Some(&1) {
        dims.remove(0);
    }
    while dims.len() > 2 && dims.last() == Some(&1) {
        dims.pop();
    }
    if dims.len() > 2 {
        return Err(OcrError::backend(format!(
            "unsupported ONNX output shape: {shape:?}"
        )));
    }

    let classes = alphabet.len() + 1;
    let (sequence_len, layout) = match dims.as_slice() {
        [seq, class] if *class == classes => (*seq, OutputLayout::SequenceMajor),
        [class, seq] if *class == classes => (*seq, OutputLayout::ClassMajor),
        [] | [1] => (1, OutputLayout::SequenceMajor),
        other => {
            return Err(OcrError::backend(format!(
                "unexpected ONNX output dimensions {other:?} for alphabet of size {classes}"
            )));
        }
    };

    if data.len() < sequence_len * classes {
        return Err(OcrError::backend(
            "onnx output buffer shorter than expected",
        ));
    }

    let mut result = String::new();
    let mut previous_idx: Option<usize> = None;
    let mut confidence_sum = 0.0f32;
    let mut confidence_count = 0usize;

    for step in 0..sequence_len {
        let mut max_logit = f32::NEG_INFINITY;
        for class in 0..classes {
            let value = get_logit(data, step, class, sequence_len, classes, layout);
            if value > max_logit {
                max_logit = value;
            }
        }
        let mut sum = 0.0f32;
        let mut best_index = 0usize;
        let mut best_prob = 0.0f32;
        for class in 0..classes {
            let value = get_logit(data, step, class, sequence_len, classes, layout);
            let exp = (value - max_logit).exp();
            sum += exp;
            if exp > best_prob {
                best_prob = exp;
                best_index = class;
            }
        }
        if sum <= 0.0 {
            continue;
        }
        let prob = best_prob / sum;
        if best_index != 0 && previous_idx != Some(best_index) {
            if let Some(character) = alphabet.get(best_index - 1) {
                result.push(*character);
                confidence_sum += prob;
                confidence_count += 1;
            }
        }
        if best_index == 0 {
            previous_idx = None;
        } else {
            previous_idx = Some(best_index);
        }
    }

    let confidence = if confidence_count > 0 {
        Some(confidence_sum / confidence_count as f32)
    } else {
        None
    };
    Ok((result, confidence))
}

#[derive(Clone, Copy)]
enum OutputLayout {
    SequenceMajor,
    ClassMajor,
}

fn get_logit(
    data: &[f32],
    step: usize,
    class: usize,
    sequence_len: usize,
    classes: usize,
    layout: OutputLayout,
) -> f32 {
    match layout {
        OutputLayout::SequenceMajor => data[step * classes + class],
        OutputLayout::ClassMajor => data[class * sequence_len + step],
    }
}

fn default_alphabet() -> Vec<char> {
    // Latin subset matching the Tesseract whitelist.
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ.,!?;:()[]{}\"'- "
        .chars()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(sequence: &[usize], classes: usize) -> Vec<f32> {
        let mut data = vec![0.0f32; sequence.len() * classes];
        for (step, &class) in sequence.iter().enumerate() {
            data[step * classes + class] = 10.0;
        }
        data
    }

    #[test]
    fn ctc_collapses_repeats_and_blanks() {
        let alphabet: Vec<char> = "HELO".chars().collect();
        let classes = alphabet.len() + 1;
        // H E L blank L O with a repeated E.
        let sequence = [1, 2, 2, 3, 0, 3, 4];
        let data = one_hot(&sequence, classes);
        let (text, confidence) =
            decode_sequence(&data, &[1, sequence.len(), classes], &alphabet).unwrap();
        assert_eq!(text, "HELLO");
        assert!(confidence.unwrap() > 0.99);
    }

    #[test]
    fn mismatched_output_shape_is_rejected() {
        let alphabet: Vec<char> = "AB".chars().collect();
        let data = vec![0.0f32; 20];
        assert!(decode_sequence(&data, &[1, 4, 5], &alphabet).is_err());
    }

    #[test]
    fn bands_are_padded_to_model_width() {
        let src = vec![255u8; 10 * 4];
        let resized = resize_with_padding(&src, 10, 4, INPUT_WIDTH, INPUT_HEIGHT);
        assert_eq!(resized.len(), INPUT_WIDTH * INPUT_HEIGHT);
        assert_eq!(resized[0], 1.0);
        assert_eq!(resized[INPUT_WIDTH - 1], 0.0);
    }

    #[test]
    fn alphabet_file_reads_one_symbol_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec_en.txt");
        std::fs::write(&path, "a\nb\n\nc\n").unwrap();
        assert_eq!(load_alphabet(&path).unwrap(), vec!['a', 'b', ' ', 'c']);
    }

    #[test]
    fn warm_up_accepts_any_installed_language() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rec_ru.onnx"), b"").unwrap();
        let mut engine = OnnxOcrEngine::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(engine.installed_languages(), vec!["ru"]);
        engine.warm_up().unwrap();

        let err = engine.prepare_language("eng").unwrap_err();
        assert!(matches!(err, OcrError::Unavailable { .. }));
        assert!(err.to_string().contains("rec_en.onnx"), "{err}");
    }

    #[test]
    fn warm_up_requires_some_model() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        let mut engine = OnnxOcrEngine::new(dir.path().to_path_buf()).unwrap();
        assert!(matches!(engine.warm_up(), Err(OcrError::Unavailable { .. })));
    }

    #[test]
    fn missing_model_directory_is_unavailable() {
        let err = OnnxOcrEngine::new(PathBuf::from("/nonexistent/models")).err().unwrap();
        assert!(matches!(err, OcrError::Unavailable { .. }));
    }
}
