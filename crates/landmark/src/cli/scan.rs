//! The `landmark scan` command: capture, identify, and show the guide.
//!
//! Drives one `LandmarkPipeline` through as many runs as the user wants:
//! a run ends in RESULT (show the guide, reset, done) or ERROR (show the
//! message, offer "Try again?", which returns to HOME for a fresh capture).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use landmark_core::capture::SnapshotCamera;
use landmark_core::{
    AppState, CaptureHandle, CaptureProvider, Config, LandmarkPipeline, PipelineError,
    PipelineSnapshot,
};

use super::display::render_record;
use super::theme::{landmark_theme, print_banner, print_error, print_hint};

/// Arguments for the `scan` command.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Photo of a landmark
    #[arg(required_unless_present = "camera", conflicts_with = "camera")]
    pub file: Option<PathBuf>,

    /// Snap a photo from a configured camera, optionally picked by name
    #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = "")]
    pub camera: Option<String>,

    /// Print the guide as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

const CAMERA_ACTIONS: &[&str] = &["Snap!", "Cancel"];

/// Execute the scan command.
pub async fn execute(args: ScanArgs, config: &Config) -> anyhow::Result<()> {
    let pipeline = LandmarkPipeline::from_config(config);
    if config.classifier.preload {
        pipeline.preload();
    }

    let mut capture = build_capture(&args, config)?;
    let theme = landmark_theme();
    if !args.json {
        print_banner();
    }

    let mut next_file = args.file.clone();
    loop {
        let handle = match acquire(&mut capture, next_file.take(), &theme).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                print_hint("No photo taken.");
                return Ok(());
            }
            // Capture failures never start a run; the pipeline stays in HOME.
            Err(e) => {
                tracing::debug!("Capture failed: {}", e.detail());
                print_error(&e.to_string());
                anyhow::bail!(e);
            }
        };

        let snapshot = run_with_spinner(&pipeline, handle, !args.json).await;
        match snapshot.state {
            AppState::Result => {
                show_result(&snapshot, args.json)?;
                pipeline.reset();
                return Ok(());
            }
            AppState::Error => {
                let message = snapshot.error.clone().unwrap_or_default();
                print_error(&message);
                pipeline.try_again();

                if args.json {
                    anyhow::bail!(message);
                }
                let again = Confirm::with_theme(&theme)
                    .with_prompt("Try again?")
                    .default(true)
                    .interact_opt()?;
                if !matches!(again, Some(true)) {
                    return Ok(());
                }
            }
            other => {
                tracing::warn!("Scan ended in unexpected state {other}");
                return Ok(());
            }
        }
    }
}

/// Build the capture provider. `--camera NAME` narrows the configured devices.
fn build_capture(args: &ScanArgs, config: &Config) -> anyhow::Result<CaptureProvider> {
    let Some(name) = args.camera.as_deref() else {
        return Ok(CaptureProvider::new(None, &config.camera));
    };

    let devices: Vec<_> = config
        .camera
        .devices
        .iter()
        .filter(|d| name.is_empty() || d.name == name)
        .cloned()
        .collect();

    if devices.is_empty() {
        let message = if name.is_empty() {
            "No cameras configured. Add a [[camera.devices]] entry, see `landmark config path`."
                .to_string()
        } else {
            format!("No camera named {name:?} in the config.")
        };
        anyhow::bail!(message);
    }

    let camera = SnapshotCamera::new(devices)
        .with_max_bytes(config.limits.max_file_size_mb * 1024 * 1024);
    Ok(CaptureProvider::new(Some(Arc::new(camera)), &config.camera))
}

/// Get one capture handle. `Ok(None)` means the user cancelled.
async fn acquire(
    capture: &mut CaptureProvider,
    file: Option<PathBuf>,
    theme: &ColorfulTheme,
) -> Result<Option<CaptureHandle>, PipelineError> {
    if capture.has_camera() {
        return snap_from_camera(capture, theme).await;
    }

    let path = match file {
        Some(path) => Some(path),
        None => prompt_for_file(theme),
    };
    capture.pick_file(path.as_deref()).await
}

/// Open the camera, let the user snap or cancel, and always release it.
async fn snap_from_camera(
    capture: &mut CaptureProvider,
    theme: &ColorfulTheme,
) -> Result<Option<CaptureHandle>, PipelineError> {
    capture.open_camera().await?;
    match capture.preview().await {
        Ok(frame) => print_hint(&format!(
            "Camera ready ({}x{}). Point it at a landmark!",
            frame.width, frame.height
        )),
        Err(e) => tracing::debug!("Preview unavailable: {}", e.detail()),
    }

    let choice = Select::with_theme(theme)
        .with_prompt("Ready?")
        .items(CAMERA_ACTIONS)
        .default(0)
        .interact_opt();

    match choice {
        Ok(Some(0)) => capture.snap().await.map(Some),
        Ok(_) => {
            capture.cancel();
            Ok(None)
        }
        Err(e) => {
            capture.cancel();
            tracing::debug!("Prompt failed: {e}");
            Ok(None)
        }
    }
}

/// Ask for another photo path. Empty input or Ctrl+C cancels.
fn prompt_for_file(theme: &ColorfulTheme) -> Option<PathBuf> {
    let raw = super::handle_interrupt(
        Input::<String>::with_theme(theme)
            .with_prompt("Path to another photo")
            .allow_empty(true)
            .interact_text(),
    )
    .ok()
    .flatten()?;

    let raw = raw.trim();
    (!raw.is_empty()).then(|| PathBuf::from(shellexpand::tilde(raw).into_owned()))
}

/// Run the pipeline while a spinner shows the current loading message.
async fn run_with_spinner(
    pipeline: &LandmarkPipeline,
    handle: CaptureHandle,
    show: bool,
) -> PipelineSnapshot {
    if !show {
        return pipeline.run(handle).await;
    }

    let spinner = create_spinner();
    let mut rx = pipeline.subscribe();
    let watcher = {
        let spinner = spinner.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let message = rx.borrow_and_update().loading_message();
                match message {
                    Some(message) => spinner.set_message(message),
                    None => break,
                }
            }
        })
    };

    let snapshot = pipeline.run(handle).await;
    watcher.abort();
    spinner.finish_and_clear();
    snapshot
}

fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.yellow} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(AppState::AnalyzingImage.loading_message().unwrap_or_default());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn show_result(snapshot: &PipelineSnapshot, json: bool) -> anyhow::Result<()> {
    let Some(record) = &snapshot.record else {
        anyhow::bail!("Scan finished without a guide");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        print!("{}", render_record(record, snapshot.prediction.as_ref()));
    }
    Ok(())
}
