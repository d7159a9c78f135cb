use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use subtitle_ocr_engine::EngineKind;
use subtitle_ocr_types::SubtitleRegion;

use crate::error::TaskError;
use crate::subtitle;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically increasing task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionSelection {
    /// Detect the region on the first decoded frame.
    #[default]
    Auto,
    Explicit(SubtitleRegion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Srt,
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Srt => "srt",
            OutputFormat::Text => "txt",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "srt" => Ok(OutputFormat::Srt),
            "txt" | "text" => Ok(OutputFormat::Text),
            other => Err(TaskError::configuration(format!(
                "unknown output format '{other}'"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

/// One video to extract subtitles from.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub video_path: PathBuf,
    pub engine: EngineKind,
    pub language: String,
    pub region: RegionSelection,
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
    pub status: TaskStatus,
}

impl Task {
    /// New pending task writing SRT next to the video, English, auto region.
    pub fn new(video_path: impl Into<PathBuf>, engine: EngineKind) -> Self {
        let video_path = video_path.into();
        let output_dir = video_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            id: TaskId::next(),
            video_path,
            engine,
            language: "eng".to_string(),
            region: RegionSelection::Auto,
            output_dir,
            output_format: OutputFormat::Srt,
            status: TaskStatus::Pending,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_region(mut self, region: RegionSelection) -> Self {
        self.region = region;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn output_path(&self) -> PathBuf {
        subtitle::output_path(&self.video_path, &self.output_dir, self.output_format)
    }
}

/// Parses `X,Y,W,H` into a non-empty region.
pub fn parse_region(value: &str) -> Result<SubtitleRegion, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [x, y, width, height] = parts.as_slice() else {
        return Err(format!("expected X,Y,W,H but got '{value}'"));
    };
    let parse = |field: &str, raw: &str| {
        raw.parse::<u32>()
            .map_err(|_| format!("invalid {field} '{raw}' in region '{value}'"))
    };
    let region = SubtitleRegion::new(
        parse("x", x)?,
        parse("y", y)?,
        parse("width", width)?,
        parse("height", height)?,
    );
    if region.is_empty() {
        return Err(format!("region '{value}' has zero width or height"));
    }
    Ok(region)
}
