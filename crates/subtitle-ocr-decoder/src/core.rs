use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use futures_core::Stream;
use futures_util::stream::unfold;
use thiserror::Error;
use tokio::sync::mpsc::{self, Sender};

pub use subtitle_ocr_types::{FrameError, VideoFrame};

pub type DecoderResult<T> = Result<T, DecoderError>;

pub type FrameStream = Pin<Box<dyn Stream<Item = DecoderResult<VideoFrame>> + Send>>;

pub type DynFrameProvider = Box<dyn FrameStreamProvider>;

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("backend {backend} is not supported in this build")]
    Unsupported { backend: &'static str },

    #[error("{backend} backend failed: {message}")]
    BackendFailure {
        backend: &'static str,
        message: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecoderError {
    pub fn unsupported(backend: &'static str) -> Self {
        Self::Unsupported { backend }
    }

    pub fn backend_failure(backend: &'static str, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            backend,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoMetadata {
    pub duration: Option<Duration>,
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub total_frames: Option<u64>,
}

impl VideoMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration_and_fps(duration: Duration, fps: f64) -> Self {
        Self {
            duration: Some(duration),
            fps: Some(fps),
            ..Default::default()
        }
    }

    pub fn calculate_total_frames(&self) -> Option<u64> {
        if let Some(total) = self.total_frames {
            return Some(total);
        }

        if let (Some(duration), Some(fps)) = (self.duration, self.fps) {
            let seconds = duration.as_secs_f64();
            let total = (seconds * fps).round();
            if total.is_finite() && total >= 0.0 {
                return Some(total as u64);
            }
        }

        None
    }

    /// Frame rate when the container reports a usable (finite, positive) value.
    pub fn usable_fps(&self) -> Option<f64> {
        self.fps.filter(|fps| fps.is_finite() && *fps > 0.0)
    }
}

pub trait FrameStreamProvider: Send + 'static {
    fn metadata(&self) -> VideoMetadata {
        VideoMetadata::default()
    }

    fn into_stream(self: Box<Self>) -> FrameStream;
}

/// Opens video files into frame providers.
pub trait VideoSource: Send {
    fn open(&self, path: &Path) -> DecoderResult<DynFrameProvider>;
}

impl<F> VideoSource for F
where
    F: Fn(&Path) -> DecoderResult<DynFrameProvider> + Send,
{
    fn open(&self, path: &Path) -> DecoderResult<DynFrameProvider> {
        self(path)
    }
}

pub fn spawn_stream_from_channel(
    capacity: usize,
    task: impl FnOnce(Sender<DecoderResult<VideoFrame>>) + Send + 'static,
) -> FrameStream {
    let (tx, rx) = mpsc::channel(capacity);
    tokio::task::spawn_blocking(move || task(tx));
    let stream = unfold(rx, |mut receiver| async {
        receiver.recv().await.map(|item| (item, receiver))
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    #[test]
    fn total_frames_falls_back_to_duration() {
        let metadata = VideoMetadata::with_duration_and_fps(Duration::from_secs(10), 30.0);
        assert_eq!(metadata.calculate_total_frames(), Some(300));

        let explicit = VideoMetadata {
            total_frames: Some(42),
            ..metadata
        };
        assert_eq!(explicit.calculate_total_frames(), Some(42));
    }

    #[test]
    fn usable_fps_rejects_degenerate_rates() {
        let mut metadata = VideoMetadata::new();
        assert_eq!(metadata.usable_fps(), None);
        metadata.fps = Some(0.0);
        assert_eq!(metadata.usable_fps(), None);
        metadata.fps = Some(f64::NAN);
        assert_eq!(metadata.usable_fps(), None);
        metadata.fps = Some(25.0);
        assert_eq!(metadata.usable_fps(), Some(25.0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn spawn_stream_from_channel_pushes_values() {
        let stream = spawn_stream_from_channel(2, move |tx| {
            tx.blocking_send(Ok(VideoFrame::from_rgb_owned(
                1,
                1,
                3,
                Some(Duration::from_millis(10)),
                vec![1, 2, 3],
            )
            .unwrap()))
                .unwrap();
        });
        let mut stream = stream;
        let frame = stream.next().await.unwrap().unwrap();
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert_eq!(frame.timestamp(), Some(Duration::from_millis(10)));
        assert!(stream.next().await.is_none());
    }
}
