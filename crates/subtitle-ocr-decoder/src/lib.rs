pub mod backends;
pub mod config;
pub mod core;

pub use backends::mock::{MockProvider, MockVideo};
pub use config::{Backend, Configuration};
pub use core::{
    DecoderError, DecoderResult, DynFrameProvider, FrameStream, FrameStreamProvider, VideoFrame,
    VideoMetadata, VideoSource,
};
