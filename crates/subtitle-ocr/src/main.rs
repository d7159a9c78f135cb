use std::io;
use std::num::NonZeroUsize;
use std::path::Path;
use std::process::ExitCode;

use serde::Serialize;
use subtitle_ocr::cli::{CliArgs, parse_cli};
use subtitle_ocr::events::WorkerEvent;
use subtitle_ocr::preview;
use subtitle_ocr::progress::TaskProgress;
use subtitle_ocr::settings::{ConfigError, EffectiveSettings, resolve_settings};
use subtitle_ocr::worker::TaskQueueWorker;
use subtitle_ocr_decoder::{Backend, Configuration, DecoderError};
use subtitle_ocr_types::SubtitleRegion;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("decoder: {0}")]
    Decoder(#[from] DecoderError),
    #[error("failed to start worker: {0}")]
    Worker(#[from] io::Error),
    #[error("failed to encode report: {0}")]
    Report(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct RegionReport<'a> {
    video: &'a Path,
    region: Option<SubtitleRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let (cli, sources) = parse_cli();
    let result = match resolve_settings(&cli, &sources) {
        Ok(settings) => run(&cli, settings).await,
        Err(err) => Err(err.into()),
    };
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &CliArgs, settings: EffectiveSettings) -> Result<bool, AppError> {
    if let Some(path) = settings.config_path.as_deref() {
        tracing::debug!(config = %path.display(), "loaded configuration");
    }
    if cli.list_engines {
        print_engines(&settings);
        return Ok(true);
    }

    let decoder = decoder_configuration(&settings)?;
    if cli.detect_region {
        return print_regions(cli, &decoder).await;
    }
    run_tasks(cli, settings, decoder).await
}

fn decoder_configuration(settings: &EffectiveSettings) -> Result<Configuration, DecoderError> {
    let mut config = Configuration::from_env()?;
    if let Some(name) = settings.decoder_backend.as_deref() {
        config.backend = name.parse::<Backend>()?;
    }
    if let Some(capacity) = settings.decoder_channel_capacity.and_then(NonZeroUsize::new) {
        config.channel_capacity = Some(capacity);
    }
    if !Configuration::available_backends().contains(&config.backend) {
        return Err(DecoderError::unsupported(config.backend.as_str()));
    }
    tracing::debug!(backend = %config.backend, "decoder configured");
    Ok(config)
}

fn print_engines(settings: &EffectiveSettings) {
    println!("engines:");
    for (kind, status) in settings.engines.probe() {
        match status {
            Ok(()) => println!(
                "  {kind:<10} available  languages: {}",
                kind.languages().join(", ")
            ),
            Err(err) => println!("  {kind:<10} unavailable  {err}"),
        }
    }
    let backends: Vec<&str> = Configuration::available_backends()
        .iter()
        .map(Backend::as_str)
        .collect();
    println!("decoder backends: {}", backends.join(", "));
}

async fn print_regions(cli: &CliArgs, decoder: &Configuration) -> Result<bool, AppError> {
    let mut all_ok = true;
    for video in &cli.inputs {
        let report = match preview::detect_region(decoder, video).await {
            Ok(region) => RegionReport {
                video,
                region,
                error: None,
            },
            Err(err) => {
                all_ok = false;
                RegionReport {
                    video,
                    region: None,
                    error: Some(err.to_string()),
                }
            }
        };
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(all_ok)
}

async fn run_tasks(
    cli: &CliArgs,
    settings: EffectiveSettings,
    decoder: Configuration,
) -> Result<bool, AppError> {
    let (worker, mut events) = TaskQueueWorker::builder(settings.engines.clone(), decoder).spawn()?;
    let mut progress = TaskProgress::new();
    for video in &cli.inputs {
        let task = settings.task_for(video);
        progress.add(&task);
        worker.submit(task);
    }

    let mut failures = 0usize;
    let mut completed = 0usize;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match &event {
                    WorkerEvent::Completed { .. } => completed += 1,
                    WorkerEvent::Failed { .. } => failures += 1,
                    _ => {}
                }
                if progress.apply(&event) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let pending = worker.pause();
                tracing::warn!(
                    pending = pending.len(),
                    "interrupted; waiting for the running task to finish"
                );
                failures += pending.len();
                break;
            }
        }
    }

    let remaining = worker.stop();
    failures += remaining.len();
    while let Ok(event) = events.try_recv() {
        match &event {
            WorkerEvent::Completed { .. } => completed += 1,
            WorkerEvent::Failed { .. } => failures += 1,
            _ => {}
        }
        progress.apply(&event);
    }
    progress.abandon_all("cancelled");

    tracing::info!(completed, failed = failures, "done");
    Ok(failures == 0)
}
