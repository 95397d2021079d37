use crate::api::ApiClient;
use crate::config::Config;
use crate::progress::{self, Summary, TransferProgress};
use crate::session::{TransferState, UploadEvent, UploadOptions, UploadOrchestrator};
use crate::types::ByteSize;
use crate::ui;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;

pub struct UploadArgs {
    pub file: PathBuf,
    pub concurrency: Option<usize>,
    pub session_id: Option<String>,
    pub api_url: Option<String>,
    pub no_wait: bool,
}

pub async fn execute(args: UploadArgs) -> Result<()> {
    let metadata = tokio::fs::metadata(&args.file)
        .await
        .with_context(|| format!("Cannot read file {}", args.file.display()))?;
    anyhow::ensure!(metadata.is_file(), "{} is not a file", args.file.display());
    let size = metadata.len();

    let filename = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let config = Config::load()?;
    let opts = UploadOptions {
        session_id: args
            .session_id
            .unwrap_or_else(|| config.effective_session_id()),
        concurrency: args
            .concurrency
            .filter(|&c| c > 0)
            .unwrap_or_else(|| config.effective_part_concurrency()),
        max_file_size_bytes: config.effective_max_file_size(),
        poll_interval: crate::poller::POLL_INTERVAL,
        wait_for_extraction: !args.no_wait,
    };

    let api = ApiClient::with_base_url(args.api_url)?;

    let system = progress::System::new();
    let reporter = system.reporter();
    let progress_id = "upload".to_string();
    let total_steps: u8 = if opts.wait_for_extraction { 4 } else { 3 };

    reporter.session_start(
        progress_id.clone(),
        format!("Uploading {} ({})", filename, ByteSize::new(size)),
        total_steps,
    )?;
    reporter.step_start(progress_id.clone(), 1, "Initiating upload".to_string(), None)?;

    let progress = TransferProgress::new(reporter.clone(), progress_id.clone(), 2, size);

    let mut orchestrator = UploadOrchestrator::new(api);
    let mut events = orchestrator
        .take_events()
        .context("upload events already consumed")?;

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    // Translate state transitions into progress steps for the renderer.
    let consumer = {
        let reporter = reporter.clone();
        let progress_id = progress_id.clone();
        let wait = opts.wait_for_extraction;
        tokio::spawn(async move {
            let mut step_started = Instant::now();
            while let Some(event) = events.recv().await {
                let result: crate::types::Result<()> = (|| {
                    match event {
                        UploadEvent::StateChanged(TransferState::Uploading) => {
                            reporter.step_complete(progress_id.clone(), 1, step_started.elapsed())?;
                            step_started = Instant::now();
                            reporter.step_start(
                                progress_id.clone(),
                                2,
                                "Uploading parts".to_string(),
                                None,
                            )?;
                        }
                        UploadEvent::StateChanged(TransferState::Completing) => {
                            reporter.step_complete(progress_id.clone(), 2, step_started.elapsed())?;
                            step_started = Instant::now();
                            reporter.step_start(
                                progress_id.clone(),
                                3,
                                "Finalizing upload".to_string(),
                                None,
                            )?;
                        }
                        UploadEvent::StateChanged(TransferState::QueuedForIngest) => {
                            reporter.step_complete(progress_id.clone(), 3, step_started.elapsed())?;
                            step_started = Instant::now();
                            if wait {
                                reporter.step_start(
                                    progress_id.clone(),
                                    4,
                                    "Extracting data from UFDR".to_string(),
                                    Some("building databases".to_string()),
                                )?;
                            }
                        }
                        UploadEvent::ExtractionStarted { upload_id } => {
                            reporter.info(format!(
                                "Upload committed; extraction started (upload id {upload_id})"
                            ))?;
                        }
                        UploadEvent::ExtractionFinished { .. } => {
                            reporter.step_complete(progress_id.clone(), 4, step_started.elapsed())?;
                        }
                        UploadEvent::StateChanged(_) => {}
                    }
                    Ok(())
                })();
                if result.is_err() {
                    break;
                }
            }
        })
    };

    let started = Instant::now();
    let outcome = orchestrator.run(&args.file, progress, &opts).await;
    drop(orchestrator);
    let _ = consumer.await;

    let result = match outcome.state {
        TransferState::Completed => {
            reporter.session_complete(
                progress_id,
                started.elapsed(),
                Summary {
                    size_bytes: size,
                    filename,
                    upload_id: outcome.upload_id,
                },
            )?;
            Ok(())
        }
        TransferState::QueuedForIngest => {
            reporter.session_complete(
                progress_id,
                started.elapsed(),
                Summary {
                    size_bytes: size,
                    filename,
                    upload_id: outcome.upload_id.clone(),
                },
            )?;
            if let Some(upload_id) = outcome.upload_id {
                ui::info(&format!(
                    "Extraction is running in the background. Check it with: ufdr-upload status {upload_id}"
                ));
            }
            Ok(())
        }
        TransferState::Aborted => {
            reporter.session_error(progress_id, "Upload aborted".to_string())?;
            Err(anyhow::anyhow!("Upload aborted"))
        }
        _ => {
            let message = outcome
                .message
                .unwrap_or_else(|| "Upload failed".to_string());
            reporter.session_error(progress_id, message.clone())?;
            Err(anyhow::anyhow!(message))
        }
    };

    drop(reporter);
    system.shutdown()?;
    result
}
