//! Tesseract command-line backend.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder};

use crate::{EngineKind, OcrEngine, OcrError, OcrRequest, Recognition};

const CHAR_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789.,!?;:()[]{}\"'- ";

#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
}

impl TesseractEngine {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Succeeds when `<binary> --version` runs and exits cleanly.
    pub fn check_binary(binary: &Path) -> Result<(), OcrError> {
        let status = Command::new(binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| {
                OcrError::unavailable(
                    EngineKind::Tesseract,
                    format!("failed to run {}: {err}", binary.display()),
                )
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(OcrError::unavailable(
                EngineKind::Tesseract,
                format!("{} --version exited with {status}", binary.display()),
            ))
        }
    }

    fn arguments(language: &str) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            language.to_string(),
            "--oem".to_string(),
            "3".to_string(),
            "--psm".to_string(),
            "7".to_string(),
            "-c".to_string(),
            format!("tessedit_char_whitelist={CHAR_WHITELIST}"),
        ]
    }
}

fn encode_png(image: &GrayImage) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::L8,
    )?;
    Ok(buffer)
}

/// Kills `child` if still running and waits so no zombie is left behind.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl OcrEngine for TesseractEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Tesseract
    }

    fn warm_up(&mut self) -> Result<(), OcrError> {
        Self::check_binary(&self.binary)
    }

    fn extract(&mut self, request: &OcrRequest<'_>) -> Result<Recognition, OcrError> {
        let image = request.image();
        if image.width() == 0 || image.height() == 0 {
            return Ok(Recognition::empty());
        }
        let png = encode_png(image)?;
        let language = EngineKind::Tesseract.language_code(request.language());

        let mut child = Command::new(&self.binary)
            .args(Self::arguments(language))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(&png) {
                drop(stdin);
                reap(&mut child);
                return Err(err.into());
            }
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::backend(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(Recognition::new(text.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn arguments_request_single_line_mode() {
        let args = TesseractEngine::arguments("deu");
        assert_eq!(&args[..4], &["stdin", "stdout", "-l", "deu"]);
        let psm = args.iter().position(|arg| arg == "--psm").unwrap();
        assert_eq!(args[psm + 1], "7");
        assert!(args.last().unwrap().ends_with("\"'- "));
    }

    #[test]
    fn png_encoding_produces_signature() {
        let mut image = GrayImage::new(4, 2);
        image.put_pixel(1, 1, Luma([255]));
        let png = encode_png(&image).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn missing_binary_fails_at_extraction() {
        let mut engine = TesseractEngine::new(PathBuf::from("/nonexistent/tesseract-binary"));
        let image = GrayImage::new(8, 8);
        let request = OcrRequest::new(&image, "eng");
        assert!(matches!(engine.extract(&request), Err(OcrError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn reaped_children_have_exited() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        reap(&mut child);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn binary_exiting_before_reading_input_fails_the_frame() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tesseract");
        std::fs::write(&script, "#!/bin/sh\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Noise does not compress, so the PNG outgrows the pipe buffer.
        let mut seed = 0x2545_f491_u32;
        let image = GrayImage::from_fn(1024, 1024, |_, _| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            Luma([(seed >> 24) as u8])
        });
        let mut engine = TesseractEngine::new(script);
        let request = OcrRequest::new(&image, "eng");
        assert!(engine.extract(&request).is_err());
    }

    #[test]
    fn empty_images_skip_the_process() {
        let mut engine = TesseractEngine::new(PathBuf::from("/nonexistent/tesseract-binary"));
        let image = GrayImage::new(0, 0);
        let request = OcrRequest::new(&image, "eng");
        assert!(engine.extract(&request).unwrap().is_empty());
    }
}
