#![cfg(feature = "backend-ffmpeg")]

use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg::util::error::{EAGAIN, EWOULDBLOCK};
use ffmpeg_next as ffmpeg;
use tokio::sync::mpsc;

use crate::core::{
    DecoderError, DecoderResult, DynFrameProvider, FrameStream, FrameStreamProvider, VideoFrame,
    VideoMetadata, spawn_stream_from_channel,
};

const BACKEND_NAME: &str = "ffmpeg";
const DEFAULT_CHANNEL_CAPACITY: usize = 8;
const AV_TIME_BASE: f64 = 1_000_000.0;

pub struct FfmpegProvider {
    input: PathBuf,
    channel_capacity: usize,
    metadata: VideoMetadata,
}

impl FfmpegProvider {
    pub fn open<P: AsRef<Path>>(path: P, channel_capacity: Option<usize>) -> DecoderResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DecoderError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input file {} does not exist", path.display()),
            )));
        }
        ffmpeg::init().map_err(failure)?;
        let metadata = probe_metadata(path)?;
        Ok(Self {
            input: path.to_path_buf(),
            channel_capacity: channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY).max(1),
            metadata,
        })
    }

    fn decode_loop(&self, tx: mpsc::Sender<DecoderResult<VideoFrame>>) -> DecoderResult<()> {
        let mut ictx = ffmpeg::format::input(&self.input).map_err(failure)?;
        let input_stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| DecoderError::backend_failure(BACKEND_NAME, "no video stream found"))?;
        let stream_index = input_stream.index();
        let time_base = input_stream.time_base();

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(failure)?;
        let mut decoder = context.decoder().video().map_err(failure)?;

        let mut scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(failure)?;

        let mut decoded = ffmpeg::util::frame::Video::empty();
        let mut converted = ffmpeg::util::frame::Video::empty();
        let mut next_index: u64 = 0;
        let mut receiver_gone = false;

        let mut drain = |decoder: &mut ffmpeg::decoder::Video| -> DecoderResult<bool> {
            loop {
                match decoder.receive_frame(&mut decoded) {
                    Ok(_) => {
                        scaler.run(&decoded, &mut converted).map_err(failure)?;
                        let pts = decoded.timestamp().or(decoded.pts());
                        let frame = frame_from_converted(&converted, pts, time_base)?
                            .with_frame_index(Some(next_index));
                        next_index += 1;
                        if tx.blocking_send(Ok(frame)).is_err() {
                            return Ok(false);
                        }
                    }
                    Err(err) => {
                        if is_retryable_error(&err) || matches!(err, ffmpeg::Error::Eof) {
                            return Ok(true);
                        }
                        return Err(failure(err));
                    }
                }
            }
        };

        for (stream, packet) in ictx.packets() {
            if stream.index() != stream_index {
                continue;
            }
            if let Err(err) = decoder.send_packet(&packet) {
                if !is_retryable_error(&err) {
                    return Err(failure(err));
                }
            }
            if !drain(&mut decoder)? {
                receiver_gone = true;
                break;
            }
        }

        if receiver_gone {
            return Ok(());
        }

        decoder.send_eof().map_err(failure)?;
        drain(&mut decoder)?;
        Ok(())
    }
}

impl FrameStreamProvider for FfmpegProvider {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn into_stream(self: Box<Self>) -> FrameStream {
        let provider = *self;
        let capacity = provider.channel_capacity;
        spawn_stream_from_channel(capacity, move |tx| {
            let result = provider.decode_loop(tx.clone());
            if let Err(err) = result {
                let _ = tx.blocking_send(Err(err));
            }
        })
    }
}

fn probe_metadata(path: &Path) -> DecoderResult<VideoMetadata> {
    let ictx = ffmpeg::format::input(&path).map_err(failure)?;
    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| DecoderError::backend_failure(BACKEND_NAME, "no video stream found"))?;

    let fps = rational_to_f64(stream.avg_frame_rate())
        .or_else(|| rational_to_f64(stream.rate()))
        .filter(|fps| *fps > 0.0);

    let duration = if stream.duration() > 0 {
        let seconds = stream.duration() as f64 * f64::from(stream.time_base());
        positive_duration(seconds)
    } else if ictx.duration() > 0 {
        positive_duration(ictx.duration() as f64 / AV_TIME_BASE)
    } else {
        None
    };

    let total_frames = u64::try_from(stream.frames()).ok().filter(|&n| n > 0);

    let context =
        ffmpeg::codec::context::Context::from_parameters(stream.parameters()).map_err(failure)?;
    let decoder = context.decoder().video().map_err(failure)?;

    let mut metadata = VideoMetadata {
        duration,
        fps,
        width: Some(decoder.width()),
        height: Some(decoder.height()),
        total_frames,
    };
    metadata.total_frames = metadata.calculate_total_frames();
    Ok(metadata)
}

fn rational_to_f64(value: ffmpeg::Rational) -> Option<f64> {
    if value.denominator() == 0 || value.numerator() == 0 {
        return None;
    }
    let rate = f64::from(value);
    rate.is_finite().then_some(rate)
}

fn positive_duration(seconds: f64) -> Option<Duration> {
    (seconds.is_finite() && seconds > 0.0).then(|| Duration::from_secs_f64(seconds))
}

fn frame_from_converted(
    frame: &ffmpeg::util::frame::Video,
    pts: Option<i64>,
    time_base: ffmpeg::Rational,
) -> DecoderResult<VideoFrame> {
    let plane = frame.data(0);
    let stride = frame.stride(0);
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 3;
    let mut buffer = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let offset = row * stride;
        buffer.extend_from_slice(&plane[offset..offset + row_bytes]);
    }
    let timestamp = pts.and_then(|pts| {
        let seconds = pts as f64 * f64::from(time_base);
        (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
    });
    Ok(VideoFrame::from_rgb_owned(
        width, height, row_bytes, timestamp, buffer,
    )?)
}

fn failure(err: ffmpeg::Error) -> DecoderError {
    DecoderError::backend_failure(BACKEND_NAME, err.to_string())
}

fn is_retryable_error(error: &ffmpeg::Error) -> bool {
    matches!(
        error,
        ffmpeg::Error::Other { errno }
            if *errno == EAGAIN || *errno == EWOULDBLOCK
    )
}

pub fn boxed_ffmpeg<P: AsRef<Path>>(
    path: P,
    channel_capacity: Option<usize>,
) -> DecoderResult<DynFrameProvider> {
    Ok(Box::new(FfmpegProvider::open(path, channel_capacity)?))
}
