use std::path::Path;

use futures_util::StreamExt;
use subtitle_ocr_decoder::VideoSource;
use subtitle_ocr_types::SubtitleRegion;
use subtitle_ocr_vision::RegionDetector;

use crate::error::TaskError;

/// Detects the subtitle region on the first frame of `path` without running
/// recognition.
pub async fn detect_region(
    source: &dyn VideoSource,
    path: &Path,
) -> Result<Option<SubtitleRegion>, TaskError> {
    let provider = source
        .open(path)
        .map_err(|err| TaskError::video_open(path, err.to_string()))?;
    let mut stream = provider.into_stream();
    let frame = match stream.next().await {
        Some(Ok(frame)) => frame,
        Some(Err(err)) => return Err(TaskError::video_open(path, err.to_string())),
        None => return Err(TaskError::video_open(path, "video has no frames")),
    };
    Ok(RegionDetector::new().detect(&frame))
}
