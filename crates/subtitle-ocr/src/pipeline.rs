use std::path::PathBuf;

use futures_util::StreamExt;
use subtitle_ocr_decoder::DynFrameProvider;
use subtitle_ocr_engine::{OcrEngine, OcrRequest};
use subtitle_ocr_types::{SubtitleRegion, VideoFrame};
use subtitle_ocr_vision::{FramePreprocessor, RegionDetector};

use crate::error::{FrameExtractionError, TaskError};
use crate::events::{EventSink, LogLevel};
use crate::sampler::{DONE_PERCENT, FrameProgress, FrameSampler, WRITING_PERCENT};
use crate::segment::SegmentBuilder;
use crate::subtitle;
use crate::task::{RegionSelection, Task};

/// Vision stages shared by every task a worker runs.
#[derive(Debug, Clone, Default)]
pub struct FramePipeline {
    pub preprocessor: FramePreprocessor,
    pub detector: RegionDetector,
}

impl FramePipeline {
    pub fn new(preprocessor: FramePreprocessor, detector: RegionDetector) -> Self {
        Self {
            preprocessor,
            detector,
        }
    }

    fn recognize(
        &self,
        frame: &VideoFrame,
        region: Option<SubtitleRegion>,
        engine: &mut dyn OcrEngine,
        language: &str,
    ) -> Result<String, FrameExtractionError> {
        let image = self.preprocessor.prepare(frame, region)?;
        let recognition = engine.extract(&OcrRequest::new(&image, language))?;
        Ok(recognition.text)
    }
}

/// Runs one task end to end and returns the written subtitle path.
///
/// Per-frame failures are reported as warnings and the frame is skipped. A
/// decode error mid-stream ends the frame loop as if the video had ended.
pub async fn run_task(
    task: &Task,
    provider: DynFrameProvider,
    engine: &mut dyn OcrEngine,
    pipeline: &FramePipeline,
    events: &EventSink,
) -> Result<PathBuf, TaskError> {
    let metadata = provider.metadata();
    let fps = metadata
        .usable_fps()
        .ok_or_else(|| TaskError::video_open(&task.video_path, "video reports no usable frame rate"))?;
    let total_frames = metadata
        .calculate_total_frames()
        .filter(|total| *total > 0)
        .ok_or_else(|| TaskError::video_open(&task.video_path, "video reports no frames"))?;

    let sampler = FrameSampler::new(fps, total_frames);
    let language = match task.engine.resolve_language(&task.language) {
        Some(code) => code,
        None => {
            let fallback = task.engine.language_code(&task.language);
            events.log(
                LogLevel::Warning,
                format!(
                    "{}: language '{}' is not supported by {}, using '{fallback}'",
                    task.video_path.display(),
                    task.language,
                    task.engine
                ),
            );
            fallback
        }
    };
    let mut progress = FrameProgress::new(total_frames);
    tracing::info!(
        task = %task.id,
        video = %task.video_path.display(),
        fps,
        total_frames,
        interval = sampler.interval(),
        language,
        "extracting subtitles"
    );

    let mut region = match task.region {
        RegionSelection::Explicit(region) => Some(Some(region)),
        RegionSelection::Auto => None,
    };
    let mut builder = SegmentBuilder::new();
    let mut stream = provider.into_stream();
    let mut position = 0u64;

    while let Some(item) = stream.next().await {
        let frame = match item {
            Ok(frame) => frame,
            Err(err) => {
                events.log(
                    LogLevel::Warning,
                    format!(
                        "{}: decoding stopped at frame {position}: {err}",
                        task.video_path.display()
                    ),
                );
                break;
            }
        };
        let index = frame.frame_index().unwrap_or(position);
        position = index + 1;
        if index >= total_frames {
            break;
        }

        let crop = *region.get_or_insert_with(|| detect_region(task, &pipeline.detector, &frame, events));

        if !sampler.should_sample(index) {
            continue;
        }
        if let Some(percent) = progress.update(index) {
            events.progress(task.id, percent);
        }

        match pipeline.recognize(&frame, crop, engine, language) {
            Ok(text) => {
                tracing::trace!(task = %task.id, index, text = %text, "recognized");
                builder = builder.push(sampler.timestamp(index), &text);
            }
            Err(err) => events.log(
                LogLevel::Warning,
                format!(
                    "{}: skipped frame {index}: {err}",
                    task.video_path.display()
                ),
            ),
        }
    }

    let segments = builder.finish(sampler.duration());
    events.progress(task.id, WRITING_PERCENT);

    let output = task.output_path();
    subtitle::write_segments(&segments, &output, task.output_format).await?;
    events.progress(task.id, DONE_PERCENT);
    tracing::info!(
        task = %task.id,
        segments = segments.len(),
        output = %output.display(),
        "subtitles written"
    );
    Ok(output)
}

fn detect_region(
    task: &Task,
    detector: &RegionDetector,
    frame: &VideoFrame,
    events: &EventSink,
) -> Option<SubtitleRegion> {
    match detector.detect(frame) {
        Some(region) => {
            events.log(
                LogLevel::Info,
                format!(
                    "{}: detected subtitle region {region}",
                    task.video_path.display()
                ),
            );
            Some(region)
        }
        None => {
            events.log(
                LogLevel::Warning,
                format!(
                    "{}: no subtitle region found, using the full frame",
                    task.video_path.display()
                ),
            );
            None
        }
    }
}
