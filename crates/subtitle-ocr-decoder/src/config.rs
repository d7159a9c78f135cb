use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "backend-ffmpeg")]
use std::sync::OnceLock;

use crate::backends::mock::MockVideo;
use crate::core::{DecoderError, DecoderResult, DynFrameProvider, VideoSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mock,
    Ffmpeg,
}

impl FromStr for Backend {
    type Err = DecoderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "ffmpeg" => Ok(Backend::Ffmpeg),
            other => Err(DecoderError::configuration(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Mock => "mock",
            Backend::Ffmpeg => "ffmpeg",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compiled_backends() -> Vec<Backend> {
    let mut backends = Vec::new();
    #[cfg(feature = "backend-ffmpeg")]
    {
        if ffmpeg_runtime_available() {
            backends.push(Backend::Ffmpeg);
        }
    }
    backends.push(Backend::Mock);
    backends
}

#[cfg(feature = "backend-ffmpeg")]
fn ffmpeg_runtime_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| ffmpeg_next::init().is_ok())
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub backend: Backend,
    pub input: Option<PathBuf>,
    pub channel_capacity: Option<NonZeroUsize>,
    /// Shape of the synthetic video produced by the mock backend.
    pub mock: MockVideo,
}

impl Default for Configuration {
    fn default() -> Self {
        let backend = compiled_backends()
            .into_iter()
            .next()
            .unwrap_or(Backend::Mock);
        Self {
            backend,
            input: None,
            channel_capacity: None,
            mock: MockVideo::default(),
        }
    }
}

impl Configuration {
    pub fn from_env() -> DecoderResult<Self> {
        let mut config = Configuration::default();
        if let Ok(backend) = env::var("SUBOCR_BACKEND") {
            config.backend = Backend::from_str(&backend)?;
        }
        if let Ok(capacity) = env::var("SUBOCR_CHANNEL_CAPACITY") {
            config.channel_capacity = Some(parse_channel_capacity(&capacity)?);
        }
        Ok(config)
    }

    pub fn available_backends() -> Vec<Backend> {
        compiled_backends()
    }

    pub fn with_input(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            input: Some(path.into()),
            ..self.clone()
        }
    }

    pub fn create_provider(&self) -> DecoderResult<DynFrameProvider> {
        let channel_capacity = self.channel_capacity.map(NonZeroUsize::get);

        match self.backend {
            Backend::Mock => Ok(crate::backends::mock::boxed_mock(
                self.mock,
                channel_capacity,
            )),
            Backend::Ffmpeg => {
                #[cfg(feature = "backend-ffmpeg")]
                {
                    let path = self.input.clone().ok_or_else(|| {
                        DecoderError::configuration("FFmpeg backend requires an input path")
                    })?;
                    crate::backends::ffmpeg::boxed_ffmpeg(path, channel_capacity)
                }
                #[cfg(not(feature = "backend-ffmpeg"))]
                {
                    Err(DecoderError::unsupported("ffmpeg"))
                }
            }
        }
    }
}

impl VideoSource for Configuration {
    fn open(&self, path: &Path) -> DecoderResult<DynFrameProvider> {
        self.with_input(path).create_provider()
    }
}

pub fn parse_channel_capacity(raw: &str) -> DecoderResult<NonZeroUsize> {
    let parsed: usize = raw.trim().parse().map_err(|_| {
        DecoderError::configuration(format!(
            "failed to parse channel capacity '{raw}' as a positive integer"
        ))
    })?;
    NonZeroUsize::new(parsed)
        .ok_or_else(|| DecoderError::configuration("channel capacity must be greater than zero"))
}
