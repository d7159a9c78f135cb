use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;
use subtitle_ocr_engine::{EngineKind, EngineSettings};
use subtitle_ocr_types::SubtitleRegion;
use thiserror::Error;

use crate::cli::{CliArgs, CliSources};
use crate::task::{OutputFormat, RegionSelection, Task};

const PROJECT_CONFIG_FILE: &str = "subtitle-ocr.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    engine: Option<String>,
    language: Option<String>,
    output_dir: Option<String>,
    format: Option<String>,
    decoder_backend: Option<String>,
    decoder_channel_capacity: Option<usize>,
    tesseract: Option<TesseractFileConfig>,
    onnx: Option<OnnxFileConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TesseractFileConfig {
    binary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OnnxFileConfig {
    model_dir: Option<String>,
}

#[derive(Debug)]
pub struct EffectiveSettings {
    pub engine: EngineKind,
    pub language: String,
    pub output_dir: Option<PathBuf>,
    pub format: OutputFormat,
    pub region: Option<SubtitleRegion>,
    pub decoder_backend: Option<String>,
    pub decoder_channel_capacity: Option<usize>,
    pub engines: EngineSettings,
    pub config_path: Option<PathBuf>,
}

impl EffectiveSettings {
    pub fn task_for(&self, video: impl Into<PathBuf>) -> Task {
        let region = match self.region {
            Some(region) => RegionSelection::Explicit(region),
            None => RegionSelection::Auto,
        };
        let task = Task::new(video, self.engine)
            .with_language(self.language.clone())
            .with_region(region)
            .with_format(self.format);
        match &self.output_dir {
            Some(dir) => task.with_output_dir(dir.clone()),
            None => task,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for '{field}'{}", in_path(.path.as_deref()))]
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    #[error("config file {} does not exist", .path.display())]
    NotFound { path: PathBuf },
}

fn in_path(path: Option<&Path>) -> String {
    path.map(|path| format!(" in {}", path.display()))
        .unwrap_or_default()
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    merge(cli, sources, file, config_path)
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        let path = path.to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        let config = read_config(&path)?;
        return Ok((config, Some(path)));
    }

    let candidates = [project_config_path(), default_config_path()];
    for path in candidates.into_iter().flatten() {
        if path.exists() {
            let config = read_config(&path)?;
            return Ok((config, Some(path)));
        }
    }
    Ok((FileConfig::default(), None))
}

fn read_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
) -> Result<EffectiveSettings, ConfigError> {
    let config_dir = config_path
        .as_ref()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));

    let FileConfig {
        engine: file_engine,
        language: file_language,
        output_dir: file_output_dir,
        format: file_format,
        decoder_backend: file_decoder_backend,
        decoder_channel_capacity: file_decoder_channel_capacity,
        tesseract: file_tesseract,
        onnx: file_onnx,
    } = file;

    let (engine_value, engine_path) = pick(
        &cli.engine,
        sources.engine_from_cli,
        file_engine,
        config_path.as_ref(),
    );
    let engine = engine_value
        .parse::<EngineKind>()
        .map_err(|_| ConfigError::InvalidValue {
            path: engine_path,
            field: "engine",
            value: engine_value.clone(),
        })?;

    let (format_value, format_path) = pick(
        &cli.format,
        sources.format_from_cli,
        file_format,
        config_path.as_ref(),
    );
    let format = format_value
        .parse::<OutputFormat>()
        .map_err(|_| ConfigError::InvalidValue {
            path: format_path,
            field: "format",
            value: format_value.clone(),
        })?;

    let (language, _) = pick(
        &cli.language,
        sources.language_from_cli,
        file_language,
        config_path.as_ref(),
    );

    let output_dir = match cli.output_dir.clone() {
        Some(dir) => Some(expand_pathbuf(dir)),
        None => normalize_string(file_output_dir)
            .and_then(|dir| resolve_path_from_config(dir, config_dir.as_deref())),
    };

    let mut decoder_backend = normalize_string(cli.backend.clone());
    if decoder_backend.is_none() {
        decoder_backend = normalize_string(file_decoder_backend);
    }

    let mut decoder_channel_capacity = cli.decoder_channel_capacity;
    if let Some(0) = decoder_channel_capacity {
        return Err(ConfigError::InvalidValue {
            path: None,
            field: "decoder_channel_capacity",
            value: "0".to_string(),
        });
    }
    if decoder_channel_capacity.is_none() {
        if let Some(value) = file_decoder_channel_capacity {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    path: config_path,
                    field: "decoder_channel_capacity",
                    value: value.to_string(),
                });
            }
            decoder_channel_capacity = Some(value);
        }
    }

    let mut engines = EngineSettings::default();
    if let Some(binary) = cli.tesseract.clone() {
        engines.tesseract_binary = expand_pathbuf(binary);
    } else if let Some(binary) = file_tesseract
        .and_then(|section| normalize_string(section.binary))
        .map(|value| resolve_binary(value, config_dir.as_deref()))
    {
        engines.tesseract_binary = binary;
    }
    engines.onnx_model_dir = match cli.onnx_model_dir.clone() {
        Some(dir) => Some(expand_pathbuf(dir)),
        None => file_onnx
            .and_then(|section| normalize_string(section.model_dir))
            .and_then(|dir| resolve_path_from_config(dir, config_dir.as_deref())),
    };

    Ok(EffectiveSettings {
        engine,
        language,
        output_dir,
        format,
        region: cli.region,
        decoder_backend,
        decoder_channel_capacity,
        engines,
        config_path,
    })
}

/// CLI value when given on the command line, otherwise the config file value,
/// otherwise the CLI default. Also returns the file the value came from.
fn pick(
    cli_value: &str,
    from_cli: bool,
    file_value: Option<String>,
    config_path: Option<&PathBuf>,
) -> (String, Option<PathBuf>) {
    if !from_cli {
        if let Some(value) = normalize_string(file_value) {
            return (value, config_path.cloned());
        }
    }
    (cli_value.trim().to_string(), None)
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "subtitle-ocr", "subtitle-ocr")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir()
        .ok()
        .map(|dir| dir.join(PROJECT_CONFIG_FILE))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_home_path(s),
        None => path,
    }
}

fn resolve_path_from_config(value: String, base: Option<&Path>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_home_path(trimmed);
    match base {
        Some(base) if !expanded.is_absolute() => Some(base.join(expanded)),
        _ => Some(expanded),
    }
}

// Bare names such as "tesseract" are left for PATH lookup.
fn resolve_binary(value: String, base: Option<&Path>) -> PathBuf {
    if Path::new(&value).components().count() > 1 || value.starts_with('~') {
        resolve_path_from_config(value.clone(), base).unwrap_or_else(|| PathBuf::from(value))
    } else {
        PathBuf::from(value)
    }
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parse_cli_from;

    fn settings_with_config(config: &str, extra: &[&str]) -> Result<EffectiveSettings, ConfigError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtitle-ocr.toml");
        fs::write(&path, config).unwrap();
        let mut args = vec![
            "subtitle-ocr".to_string(),
            "--config".to_string(),
            path.display().to_string(),
        ];
        args.extend(extra.iter().map(|arg| arg.to_string()));
        args.push("clip.mp4".to_string());
        let (cli, sources) = parse_cli_from(args).unwrap();
        resolve_settings(&cli, &sources)
    }

    #[test]
    fn config_file_fills_unset_options() {
        let settings = settings_with_config(
            r#"
engine = "onnx"
language = "jpn"
format = "txt"
output_dir = "subs"
decoder_channel_capacity = 4

[tesseract]
binary = "/opt/tesseract/bin/tesseract"

[onnx]
model_dir = "models"
"#,
            &[],
        )
        .unwrap();

        assert_eq!(settings.engine, EngineKind::Onnx);
        assert_eq!(settings.language, "jpn");
        assert_eq!(settings.format, OutputFormat::Text);
        assert!(settings.output_dir.unwrap().ends_with("subs"));
        assert_eq!(settings.decoder_channel_capacity, Some(4));
        assert_eq!(
            settings.engines.tesseract_binary,
            PathBuf::from("/opt/tesseract/bin/tesseract")
        );
        assert!(settings.engines.onnx_model_dir.unwrap().ends_with("models"));
        assert!(settings.config_path.unwrap().ends_with("subtitle-ocr.toml"));
    }

    #[test]
    fn command_line_wins_over_config() {
        let settings = settings_with_config(
            "engine = \"onnx\"\nformat = \"txt\"\nlanguage = \"jpn\"\n",
            &["--engine", "tesseract", "--format", "srt", "-l", "chi_sim"],
        )
        .unwrap();
        assert_eq!(settings.engine, EngineKind::Tesseract);
        assert_eq!(settings.format, OutputFormat::Srt);
        assert_eq!(settings.language, "chi_sim");
    }

    #[test]
    fn defaults_apply_without_config_values() {
        let settings = settings_with_config("", &[]).unwrap();
        assert_eq!(settings.engine, EngineKind::Tesseract);
        assert_eq!(settings.language, "eng");
        assert_eq!(settings.format, OutputFormat::Srt);
        assert_eq!(settings.output_dir, None);
        assert_eq!(settings.engines, EngineSettings::default());
    }

    #[test]
    fn unknown_values_are_configuration_errors() {
        let err = settings_with_config("engine = \"paddle\"\n", &[]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "engine", path: Some(_), .. }
        ));

        let err = settings_with_config("", &["--format", "vtt"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "format", path: None, .. }
        ));

        let err = settings_with_config("decoder_channel_capacity = 0\n", &[]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "decoder_channel_capacity", .. }
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = settings_with_config("engine = [", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_config_override_is_reported() {
        let (cli, sources) =
            parse_cli_from(["subtitle-ocr", "--config", "/nonexistent/subtitle-ocr.toml", "a.mp4"])
                .unwrap();
        assert!(matches!(
            resolve_settings(&cli, &sources),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn tasks_inherit_settings() {
        let (cli, sources) = parse_cli_from([
            "subtitle-ocr",
            "--config",
            "/nonexistent/subtitle-ocr.toml",
            "a.mp4",
        ])
        .unwrap();
        let settings = merge(&cli, &sources, FileConfig::default(), None).unwrap();
        let task = settings.task_for("/videos/a.mp4");
        assert_eq!(task.engine, EngineKind::Tesseract);
        assert_eq!(task.region, RegionSelection::Auto);
        assert_eq!(task.output_dir, PathBuf::from("/videos"));

        let explicit = EffectiveSettings {
            output_dir: Some(PathBuf::from("/out")),
            region: Some(SubtitleRegion::new(0, 500, 640, 80)),
            ..settings
        };
        let task = explicit.task_for("/videos/a.mp4");
        assert_eq!(task.output_path(), PathBuf::from("/out/a_ocr.srt"));
        assert_eq!(
            task.region,
            RegionSelection::Explicit(SubtitleRegion::new(0, 500, 640, 80))
        );
    }

    #[test]
    fn relative_paths_resolve_against_the_config_dir() {
        let base = Path::new("/etc/subtitle-ocr");
        assert_eq!(
            resolve_path_from_config("models".into(), Some(base)),
            Some(PathBuf::from("/etc/subtitle-ocr/models"))
        );
        assert_eq!(
            resolve_path_from_config("/abs".into(), Some(base)),
            Some(PathBuf::from("/abs"))
        );
        assert_eq!(resolve_path_from_config("  ".into(), Some(base)), None);
        assert_eq!(resolve_binary("tesseract".into(), Some(base)), PathBuf::from("tesseract"));
        assert_eq!(
            resolve_binary("bin/tesseract".into(), Some(base)),
            PathBuf::from("/etc/subtitle-ocr/bin/tesseract")
        );
    }
}
