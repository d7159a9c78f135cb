use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use subtitle_ocr_types::Segment;
use thiserror::Error;
use tokio::fs;

use crate::error::TaskError;
use crate::task::OutputFormat;

const OUTPUT_SUFFIX: &str = "_ocr";

pub fn render(segments: &[Segment], format: OutputFormat) -> String {
    match format {
        OutputFormat::Srt => render_srt(segments),
        OutputFormat::Text => render_text(segments),
    }
}

pub fn render_srt(segments: &[Segment]) -> String {
    let mut output = String::new();
    for (idx, segment) in segments.iter().enumerate() {
        if idx > 0 {
            output.push('\n');
        }
        let _ = writeln!(&mut output, "{}", idx + 1);
        let _ = writeln!(
            &mut output,
            "{} --> {}",
            format_timestamp(segment.start),
            format_timestamp(segment.end)
        );
        let _ = writeln!(&mut output, "{}", segment.text.trim());
    }
    output
}

pub fn render_text(segments: &[Segment]) -> String {
    let mut output = String::new();
    for segment in segments {
        let _ = writeln!(&mut output, "{}", segment.text.trim());
    }
    output
}

fn format_timestamp(time: Duration) -> String {
    let millis = time
        .as_secs()
        .saturating_mul(1000)
        .saturating_add(u64::from(time.subsec_millis()));
    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let seconds = (millis % 60_000) / 1000;
    let remain_ms = millis % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{remain_ms:03}")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SrtParseError {
    #[error("line {line}: expected a cue index but found '{found}'")]
    Index { line: usize, found: String },

    #[error("line {line}: malformed timing line '{found}'")]
    Timing { line: usize, found: String },

    #[error("cue {index} ends before its timing line")]
    Truncated { index: usize },
}

/// Parses SRT text as produced by [`render_srt`]. Multi-line cue text is
/// joined with `\n`.
pub fn parse_srt(input: &str) -> Result<Vec<Segment>, SrtParseError> {
    let mut segments = Vec::new();
    let mut lines = input.lines().enumerate().peekable();

    loop {
        while lines.next_if(|(_, line)| line.trim().is_empty()).is_some() {}
        let Some((line_no, index_line)) = lines.next() else {
            break;
        };
        let index = index_line
            .trim()
            .trim_start_matches('\u{feff}')
            .parse::<usize>()
            .map_err(|_| SrtParseError::Index {
                line: line_no + 1,
                found: index_line.to_string(),
            })?;

        let Some((line_no, timing_line)) = lines.next() else {
            return Err(SrtParseError::Truncated { index });
        };
        let (start, end) = parse_timing(timing_line).ok_or_else(|| SrtParseError::Timing {
            line: line_no + 1,
            found: timing_line.to_string(),
        })?;

        let mut text = Vec::new();
        while let Some((_, line)) = lines.next_if(|(_, line)| !line.trim().is_empty()) {
            text.push(line.trim());
        }
        segments.push(Segment::new(start, end, text.join("\n")));
    }

    Ok(segments)
}

fn parse_timing(line: &str) -> Option<(Duration, Duration)> {
    let (start, end) = line.split_once("-->")?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end.trim())?))
}

fn parse_timestamp(value: &str) -> Option<Duration> {
    let (clock, millis) = value.split_once([',', '.'])?;
    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    let millis: u64 = millis.parse().ok()?;
    if millis >= 1000 {
        return None;
    }
    Some(Duration::from_millis(
        ((hours * 60 + minutes) * 60 + seconds) * 1000 + millis,
    ))
}

/// `<dir>/<video stem>_ocr.<ext>`.
pub fn output_path(video: &Path, dir: &Path, format: OutputFormat) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "subtitles".to_string());
    dir.join(format!("{stem}{OUTPUT_SUFFIX}.{}", format.extension()))
}

/// Renders and writes the segments, creating the parent directory and
/// replacing any existing file.
pub async fn write_segments(
    segments: &[Segment],
    path: &Path,
    format: OutputFormat,
) -> Result<(), TaskError> {
    let write_error = |source| TaskError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    fs::write(path, render(segments, format))
        .await
        .map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_segments() -> Vec<Segment> {
        vec![
            Segment::new(
                Duration::from_millis(0),
                Duration::from_millis(2_500),
                " Hello there ",
            ),
            Segment::new(
                Duration::from_millis(2_500),
                Duration::from_millis(3_725_042),
                "General Kenobi!",
            ),
        ]
    }

    #[test]
    fn srt_blocks_are_numbered_and_separated() {
        let rendered = render_srt(&sample_segments());
        assert_eq!(
            rendered,
            "1\n00:00:00,000 --> 00:00:02,500\nHello there\n\n\
             2\n00:00:02,500 --> 01:02:05,042\nGeneral Kenobi!\n"
        );
    }

    #[test]
    fn text_output_has_one_line_per_segment() {
        assert_eq!(
            render_text(&sample_segments()),
            "Hello there\nGeneral Kenobi!\n"
        );
        assert_eq!(render_text(&[]), "");
    }

    #[test]
    fn rendered_srt_parses_back() {
        let segments = vec![
            Segment::new(Duration::from_millis(500), Duration::from_millis(1_500), "One"),
            Segment::new(Duration::from_millis(1_500), Duration::from_secs(4), "Two words"),
        ];
        let parsed = parse_srt(&render_srt(&segments)).unwrap();
        assert_eq!(parsed, segments);
    }

    #[test]
    fn parser_accepts_multiline_cues_and_crlf() {
        let input = "1\r\n00:00:01,000 --> 00:00:02,000\r\nTop\r\nBottom\r\n\r\n\r\n2\r\n00:00:03.250 --> 00:00:04,000\r\nNext\r\n";
        let parsed = parse_srt(input).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "Top\nBottom");
        assert_eq!(parsed[1].start, Duration::from_millis(3_250));
    }

    #[test]
    fn parser_reports_malformed_input() {
        assert!(matches!(
            parse_srt("one\n00:00:01,000 --> 00:00:02,000\nText\n"),
            Err(SrtParseError::Index { line: 1, .. })
        ));
        assert!(matches!(
            parse_srt("1\n00:00:01 --> 00:00:02\nText\n"),
            Err(SrtParseError::Timing { line: 2, .. })
        ));
        assert_eq!(parse_srt("1\n"), Err(SrtParseError::Truncated { index: 1 }));
        assert_eq!(parse_srt(""), Ok(Vec::new()));
    }

    #[test]
    fn output_path_uses_the_video_stem() {
        assert_eq!(
            output_path(Path::new("/in/movie.final.mkv"), Path::new("/out"), OutputFormat::Srt),
            PathBuf::from("/out/movie.final_ocr.srt")
        );
        assert_eq!(
            output_path(Path::new("clip"), Path::new("out"), OutputFormat::Text),
            PathBuf::from("out/clip_ocr.txt")
        );
    }

    #[tokio::test]
    async fn write_creates_directories_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clip_ocr.srt");

        write_segments(&sample_segments(), &path, OutputFormat::Srt)
            .await
            .unwrap();
        write_segments(&[], &path, OutputFormat::Srt).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "");
    }

    #[tokio::test]
    async fn write_reports_the_failing_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let path = blocker.join("clip_ocr.txt");

        let err = write_segments(&sample_segments(), &path, OutputFormat::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Write { .. }));
    }
}
