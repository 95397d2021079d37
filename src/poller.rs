use crate::api::models::upload::ExtractionStatusResponse;
use crate::api::ApiClient;
use crate::error::UploadClientError;
use crate::types::Result;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polls the extraction-status endpoint until the backend job reaches a
/// terminal state.
///
/// Each tick is independent: a transient failure is logged and the next
/// tick proceeds on schedule. The loop reports a terminal status exactly
/// once and stops immediately; tearing down is the caller's cancellation
/// token.
pub async fn poll_extraction_status(
    api: &ApiClient,
    upload_id: &str,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<ExtractionStatusResponse> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(UploadClientError::Aborted.into()),
            _ = sleep(interval) => {}
        }

        match api.extraction_status(upload_id).await {
            Ok(status) if status.overall_status.is_terminal() => {
                log::debug!(
                    "Extraction for {upload_id} reached terminal status {}",
                    status.overall_status
                );
                return Ok(status);
            }
            Ok(status) => {
                log::debug!(
                    "Extraction for {upload_id} still {}",
                    status.overall_status
                );
            }
            Err(err) => {
                let err = UploadClientError::Poll(format!("{err:#}"));
                log::warn!("Extraction status tick for {upload_id} failed: {err}");
            }
        }
    }
}
