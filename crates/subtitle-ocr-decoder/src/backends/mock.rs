use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::Sender;

use crate::core::{
    DecoderResult, DynFrameProvider, FrameStream, FrameStreamProvider, VideoFrame, VideoMetadata,
    spawn_stream_from_channel,
};

/// Shape of a synthetic clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockVideo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
}

impl Default for MockVideo {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
            fps: 30.0,
            frame_count: 90,
        }
    }
}

pub struct MockProvider {
    video: MockVideo,
    frames: Option<Arc<[VideoFrame]>>,
    channel_capacity: usize,
}

impl MockProvider {
    const DEFAULT_CHANNEL_CAPACITY: usize = 8;

    pub fn new(video: MockVideo) -> Self {
        Self {
            video,
            frames: None,
            channel_capacity: Self::DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Replays `frames` in order, reporting them as a clip at `fps`.
    ///
    /// Dimensions are taken from the first frame.
    pub fn from_frames(frames: Vec<VideoFrame>, fps: f64) -> Self {
        let (width, height) = frames
            .first()
            .map(|frame| (frame.width(), frame.height()))
            .unwrap_or((0, 0));
        Self {
            video: MockVideo {
                width,
                height,
                fps,
                frame_count: frames.len() as u64,
            },
            frames: Some(Arc::from(frames.into_boxed_slice())),
            channel_capacity: Self::DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    fn timestamp_for(&self, index: u64) -> Option<Duration> {
        if self.video.fps.is_finite() && self.video.fps > 0.0 {
            Some(Duration::from_secs_f64(index as f64 / self.video.fps))
        } else {
            None
        }
    }

    fn synthesize(&self, index: u64) -> DecoderResult<VideoFrame> {
        let width = self.video.width as usize;
        let height = self.video.height as usize;
        let stride = width * 3;
        let mut buffer = vec![0u8; stride * height];
        for (row, chunk) in buffer.chunks_mut(stride.max(1)).enumerate() {
            let value = ((row as u64 + index) % 256) as u8;
            chunk.fill(value);
        }
        let frame = VideoFrame::from_rgb_owned(
            self.video.width,
            self.video.height,
            stride,
            self.timestamp_for(index),
            buffer,
        )?;
        Ok(frame)
    }

    fn emit_frames(&self, tx: Sender<DecoderResult<VideoFrame>>) {
        for index in 0..self.video.frame_count {
            if tx.is_closed() {
                break;
            }
            let frame = match &self.frames {
                Some(frames) => Ok(frames[index as usize]
                    .clone()
                    .with_timestamp(self.timestamp_for(index))),
                None => self.synthesize(index),
            }
            .map(|frame| frame.with_frame_index(Some(index)));
            if tx.blocking_send(frame).is_err() {
                break;
            }
        }
    }
}

impl FrameStreamProvider for MockProvider {
    fn metadata(&self) -> VideoMetadata {
        let duration = if self.video.fps.is_finite() && self.video.fps > 0.0 {
            Some(Duration::from_secs_f64(
                self.video.frame_count as f64 / self.video.fps,
            ))
        } else {
            None
        };
        VideoMetadata {
            duration,
            fps: Some(self.video.fps),
            width: Some(self.video.width),
            height: Some(self.video.height),
            total_frames: Some(self.video.frame_count),
        }
    }

    fn into_stream(self: Box<Self>) -> FrameStream {
        let provider = *self;
        let capacity = provider.channel_capacity;
        spawn_stream_from_channel(capacity, move |tx| {
            provider.emit_frames(tx);
        })
    }
}

pub fn boxed_mock(video: MockVideo, channel_capacity: Option<usize>) -> DynFrameProvider {
    let provider = MockProvider::new(video);
    let provider = match channel_capacity {
        Some(capacity) => provider.with_channel_capacity(capacity),
        None => provider,
    };
    Box::new(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test(flavor = "multi_thread")]
    async fn mock_backend_emits_frames() {
        let decoder = boxed_mock(MockVideo::default(), None);
        let metadata = decoder.metadata();
        assert_eq!(metadata.total_frames, Some(90));
        assert_eq!(metadata.duration, Some(Duration::from_secs(3)));
        let mut stream = decoder.into_stream();
        let frame = stream.next().await.unwrap().unwrap();
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 180);
        assert_eq!(frame.data().len(), 320 * 3 * 180);
        assert_eq!(frame.frame_index(), Some(0));
        assert_eq!(frame.timestamp(), Some(Duration::ZERO));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replayed_frames_are_indexed_and_timed() {
        let frames = vec![VideoFrame::filled(4, 2, 0), VideoFrame::filled(4, 2, 255)];
        let provider: DynFrameProvider = Box::new(MockProvider::from_frames(frames, 2.0));
        let collected: Vec<_> = provider.into_stream().collect().await;
        assert_eq!(collected.len(), 2);
        let second = collected[1].as_ref().unwrap();
        assert_eq!(second.frame_index(), Some(1));
        assert_eq!(second.timestamp(), Some(Duration::from_millis(500)));
        assert_eq!(second.pixel(0, 0), Some((255, 255, 255)));
    }
}
