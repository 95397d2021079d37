use crate::api::models::upload::{CompletedPart, ExtractionStatusResponse, OverallStatus};
use crate::api::ApiClient;
use crate::error::{is_aborted, UploadClientError};
use crate::multipart_upload::upload_parts;
use crate::planner::plan_parts;
use crate::poller::poll_extraction_status;
use crate::progress::TransferProgress;
use crate::types::Result;
use anyhow::Context;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Status of one user-initiated upload attempt. One orchestrator drives
/// exactly one attempt; selecting a new file means building a fresh
/// orchestrator, which discards the previous session's tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Initiating,
    Uploading,
    Completing,
    QueuedForIngest,
    Completed,
    Failed,
    Aborted,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed | TransferState::Aborted
        )
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransferState::Idle => "idle",
            TransferState::Initiating => "initiating",
            TransferState::Uploading => "uploading",
            TransferState::Completing => "completing",
            TransferState::QueuedForIngest => "queued_for_ingest",
            TransferState::Completed => "completed",
            TransferState::Failed => "failed",
            TransferState::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    StateChanged(TransferState),
    /// The upload was committed and the backend job began; the host UI may
    /// show a non-blocking overlay and keep the rest of the app usable.
    ExtractionStarted { upload_id: String },
    /// The poller saw a terminal extraction status; carries its last payload.
    ExtractionFinished {
        upload_id: String,
        status: ExtractionStatusResponse,
    },
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub session_id: String,
    pub concurrency: usize,
    pub max_file_size_bytes: u64,
    pub poll_interval: Duration,
    /// When false the orchestrator returns right after queued_for_ingest
    /// instead of waiting out the extraction job.
    pub wait_for_extraction: bool,
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub state: TransferState,
    pub upload_id: Option<String>,
    pub extraction: Option<ExtractionStatusResponse>,
    pub message: Option<String>,
}

/// Drives one upload attempt end to end:
/// init → upload parts → complete → queued_for_ingest → poll → terminal.
pub struct UploadOrchestrator {
    api: ApiClient,
    cancel: CancellationToken,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    state: TransferState,
    upload_id: Option<String>,
}

impl UploadOrchestrator {
    pub fn new(api: ApiClient) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            api,
            cancel: CancellationToken::new(),
            events_tx,
            events_rx: Some(events_rx),
            state: TransferState::Idle,
            upload_id: None,
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Token shared by every network call of this attempt. Cancelling it
    /// aborts in-flight part transfers and suppresses further dispatch.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub async fn run(
        &mut self,
        file_path: &Path,
        progress: TransferProgress,
        opts: &UploadOptions,
    ) -> UploadOutcome {
        match self.drive(file_path, progress, opts).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let state = if is_aborted(&err) {
                    TransferState::Aborted
                } else {
                    TransferState::Failed
                };
                self.set_state(state);
                UploadOutcome {
                    state: self.state,
                    upload_id: self.upload_id.clone(),
                    extraction: None,
                    message: Some(format!("{err:#}")),
                }
            }
        }
    }

    async fn drive(
        &mut self,
        file_path: &Path,
        progress: TransferProgress,
        opts: &UploadOptions,
    ) -> Result<UploadOutcome> {
        let filename = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| UploadClientError::Plan("file has no name".to_string()))?;

        let size = tokio::fs::metadata(file_path).await?.len();
        if size > opts.max_file_size_bytes {
            return Err(UploadClientError::FileTooLarge {
                size,
                limit: opts.max_file_size_bytes,
            }
            .into());
        }

        self.check_aborted()?;
        self.set_state(TransferState::Initiating);

        let init = self
            .api
            .init_upload(&filename, size, &opts.session_id)
            .await?;
        let plans = plan_parts(size, &init)?;
        let upload_id = init
            .upload_id
            .clone()
            .unwrap_or_default();
        self.upload_id = Some(upload_id.clone());

        self.check_aborted()?;
        self.set_state(TransferState::Uploading);

        let results = upload_parts(
            file_path,
            plans,
            opts.concurrency,
            &progress,
            self.api.transfer_client(),
            &self.cancel,
        )
        .await?;
        progress.finish_uploading();

        self.check_aborted()?;
        self.set_state(TransferState::Completing);

        let completed_parts: Vec<CompletedPart> = results
            .into_iter()
            .map(|result| CompletedPart {
                part_number: result.part_number,
                etag: result.etag,
            })
            .collect();
        self.api
            .complete_upload(&upload_id, completed_parts)
            .await
            .context("Failed to finalize upload")?;

        self.set_state(TransferState::QueuedForIngest);
        self.emit(UploadEvent::ExtractionStarted {
            upload_id: upload_id.clone(),
        });

        if !opts.wait_for_extraction {
            return Ok(UploadOutcome {
                state: self.state,
                upload_id: Some(upload_id),
                extraction: None,
                message: None,
            });
        }

        let status =
            poll_extraction_status(&self.api, &upload_id, opts.poll_interval, &self.cancel).await?;

        let final_state = if status.overall_status == OverallStatus::Completed {
            TransferState::Completed
        } else {
            TransferState::Failed
        };
        self.set_state(final_state);
        self.emit(UploadEvent::ExtractionFinished {
            upload_id: upload_id.clone(),
            status: status.clone(),
        });

        Ok(UploadOutcome {
            state: self.state,
            upload_id: Some(upload_id),
            message: status.error_message.clone(),
            extraction: Some(status),
        })
    }

    fn check_aborted(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(UploadClientError::Aborted.into());
        }
        Ok(())
    }

    fn set_state(&mut self, state: TransferState) {
        // Terminal states are entered exactly once.
        if self.state.is_terminal() || self.state == state {
            return;
        }
        log::debug!("transfer state {} -> {}", self.state, state);
        self.state = state;
        self.emit(UploadEvent::StateChanged(state));
    }

    fn emit(&self, event: UploadEvent) {
        if self.events_tx.try_send(event).is_err() {
            log::debug!("upload event dropped (receiver gone or lagging)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransferState::Completed.is_terminal());
        assert!(TransferState::Failed.is_terminal());
        assert!(TransferState::Aborted.is_terminal());
        assert!(!TransferState::Uploading.is_terminal());
        assert!(!TransferState::QueuedForIngest.is_terminal());
    }

    #[test]
    fn test_state_display_matches_wire_values() {
        assert_eq!(TransferState::QueuedForIngest.to_string(), "queued_for_ingest");
        assert_eq!(TransferState::Aborted.to_string(), "aborted");
    }

    #[tokio::test]
    async fn test_abort_before_run_yields_aborted_outcome() {
        std::env::set_var("UFDR_TEST_MODE", "1");
        let api = ApiClient::with_base_url(Some("http://127.0.0.1:9".to_string())).unwrap();
        let mut orchestrator = UploadOrchestrator::new(api);
        orchestrator.abort();

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"payload").unwrap();

        let progress = TransferProgress::new_noop(7);
        let opts = UploadOptions {
            session_id: "cli-session".to_string(),
            concurrency: 3,
            max_file_size_bytes: 1024,
            poll_interval: Duration::from_millis(10),
            wait_for_extraction: true,
        };

        let outcome = orchestrator.run(file.path(), progress, &opts).await;
        assert_eq!(outcome.state, TransferState::Aborted);
        assert_eq!(orchestrator.state(), TransferState::Aborted);
    }

    #[tokio::test]
    async fn test_oversized_file_fails_before_init() {
        std::env::set_var("UFDR_TEST_MODE", "1");
        let api = ApiClient::with_base_url(Some("http://127.0.0.1:9".to_string())).unwrap();
        let mut orchestrator = UploadOrchestrator::new(api);

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"0123456789").unwrap();

        let progress = TransferProgress::new_noop(10);
        let opts = UploadOptions {
            session_id: "cli-session".to_string(),
            concurrency: 3,
            max_file_size_bytes: 4,
            poll_interval: Duration::from_millis(10),
            wait_for_extraction: true,
        };

        let outcome = orchestrator.run(file.path(), progress, &opts).await;
        assert_eq!(outcome.state, TransferState::Failed);
        assert!(outcome.message.unwrap().contains("too large"));
    }

    #[tokio::test]
    async fn test_terminal_state_is_entered_once() {
        std::env::set_var("UFDR_TEST_MODE", "1");
        let api = ApiClient::with_base_url(Some("http://127.0.0.1:9".to_string())).unwrap();
        let mut orchestrator = UploadOrchestrator::new(api);
        let mut events = orchestrator.take_events().unwrap();

        orchestrator.set_state(TransferState::Failed);
        orchestrator.set_state(TransferState::Aborted);
        orchestrator.set_state(TransferState::Completed);
        assert_eq!(orchestrator.state(), TransferState::Failed);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let UploadEvent::StateChanged(state) = event {
                seen.push(state);
            }
        }
        assert_eq!(seen, vec![TransferState::Failed]);
    }
}
