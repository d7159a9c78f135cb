use std::ffi::OsString;
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use subtitle_ocr_types::SubtitleRegion;

use crate::task::parse_region;

#[derive(Debug, Default)]
pub struct CliSources {
    pub engine_from_cli: bool,
    pub language_from_cli: bool,
    pub format_from_cli: bool,
}

impl CliSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            engine_from_cli: value_from_cli(matches, "engine"),
            language_from_cli: value_from_cli(matches, "language"),
            format_from_cli: value_from_cli(matches, "format"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let command = CliArgs::command();
    let matches = command.get_matches();
    from_matches(&matches)
}

/// Parses an explicit argument list; the first item is the program name.
pub fn parse_cli_from<I, T>(args: I) -> Result<(CliArgs, CliSources), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = CliArgs::command().try_get_matches_from(args)?;
    let args = CliArgs::from_arg_matches(&matches)?;
    Ok((args, CliSources::from_matches(&matches)))
}

fn from_matches(matches: &ArgMatches) -> (CliArgs, CliSources) {
    let args = match CliArgs::from_arg_matches(matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(matches);
    (args, sources)
}

#[derive(Debug, Parser)]
#[command(
    name = "subtitle-ocr",
    about = "Extract burned-in subtitles from videos with OCR",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Text recognition engine (tesseract, onnx)
    #[arg(short = 'e', long = "engine", default_value = "tesseract")]
    pub engine: String,

    /// Language of the subtitles: eng, rus, deu, fra, spa, ita, ukr, pol
    /// (two-letter forms such as en or ru are accepted)
    #[arg(short = 'l', long = "language", default_value = "eng")]
    pub language: String,

    /// Directory for subtitle files; defaults to each video's directory
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format (srt, txt)
    #[arg(short = 'f', long = "format", default_value = "srt")]
    pub format: String,

    /// Subtitle region in pixels; detected automatically when omitted
    #[arg(long = "region", value_name = "X,Y,W,H", value_parser = parse_region)]
    pub region: Option<SubtitleRegion>,

    /// Lock decoding to a specific backend implementation
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,

    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Path to the tesseract executable
    #[arg(long = "tesseract", value_name = "PATH")]
    pub tesseract: Option<PathBuf>,

    /// Directory containing rec_<lang>.onnx recognition models
    #[arg(long = "onnx-model-dir", value_name = "DIR")]
    pub onnx_model_dir: Option<PathBuf>,

    /// Decoder frame queue capacity before applying backpressure
    #[arg(
        long = "decoder-channel-capacity",
        id = "decoder_channel_capacity",
        value_parser = clap::value_parser!(usize)
    )]
    pub decoder_channel_capacity: Option<usize>,

    /// Print which recognition engines are usable and exit
    #[arg(long = "list-engines")]
    pub list_engines: bool,

    /// Print the detected subtitle region of each video and exit
    #[arg(long = "detect-region")]
    pub detect_region: bool,

    /// Input video paths
    #[arg(value_name = "VIDEO", required_unless_present = "list_engines")]
    pub inputs: Vec<PathBuf>,
}
