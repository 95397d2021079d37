use crate::error::UploadClientError;
use crate::planner::PartPlan;
use crate::progress::TransferProgress;
use crate::transfer::send_transfer_request_with_retry;
use anyhow::{Context, Result};
use futures_util::future::join_all;
use reqwest::Client;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const STREAM_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Outcome of one successful part transfer. The etag is the storage
/// backend's validation token; some backends omit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartResult {
    pub part_number: u64,
    pub etag: Option<String>,
    pub bytes_sent: u64,
}

/// Uploads a single part's byte range to its pre-signed URL.
///
/// The transfer is wrapped in bounded retry; a cancellation pre-empts the
/// request (and any retry of it) and surfaces as `Aborted`.
pub async fn upload_part(
    file_path: &Path,
    plan: &PartPlan,
    client: &Client,
    cancel: &CancellationToken,
) -> Result<PartResult> {
    if cancel.is_cancelled() {
        return Err(UploadClientError::Aborted.into());
    }

    log::debug!(
        "Uploading part {} offset {} ({} bytes)",
        plan.part_number,
        plan.offset,
        plan.len
    );

    let operation_name = format!("Upload part {}", plan.part_number);

    let response = send_transfer_request_with_retry(operation_name.as_str(), || async {
        let transfer = async {
            let file = File::open(file_path)
                .await
                .with_context(|| format!("Failed to open file {}", file_path.display()))?;
            let mut reader = tokio::io::BufReader::with_capacity(STREAM_CHUNK_SIZE, file);
            reader
                .seek(std::io::SeekFrom::Start(plan.offset))
                .await
                .context("Failed to seek file for part upload")?;

            let bytes_to_stream = plan.len;
            let (tx, rx) = tokio::sync::mpsc::channel::<Result<Vec<u8>, std::io::Error>>(4);

            let send_task = tokio::spawn(async move {
                let mut reader = reader;
                let mut remaining = bytes_to_stream;
                while remaining > 0 {
                    let to_read = remaining.min(STREAM_CHUNK_SIZE as u64) as usize;
                    let mut buffer = vec![0u8; to_read];
                    if let Err(err) = reader.read_exact(&mut buffer).await {
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                    remaining -= to_read as u64;
                    if tx.send(Ok(buffer)).await.is_err() {
                        return;
                    }
                }
            });

            let response = client
                .put(&plan.url)
                .header("content-type", "application/octet-stream")
                .header("content-length", plan.len.to_string())
                .body(reqwest::Body::wrap_stream(ReceiverStream::new(rx)))
                .send()
                .await
                .with_context(|| format!("Failed to upload part {}", plan.part_number))?;

            let _ = send_task.await;

            Ok(response)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(UploadClientError::Aborted.into()),
            result = transfer => result,
        }
    })
    .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        log::error!(
            "Upload part {} failed: HTTP {} - {}",
            plan.part_number,
            status,
            body
        );
        return Err(UploadClientError::Transfer {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    let etag = extract_etag(&response);

    Ok(PartResult {
        part_number: plan.part_number,
        etag,
        bytes_sent: plan.len,
    })
}

/// Runs a fixed-size pool of part-upload workers over the plan.
///
/// Workers claim parts through a shared atomic counter, so no part is ever
/// claimed twice. The first unrecoverable failure trips the stop token:
/// unclaimed parts stay unclaimed, in-flight uploads settle, and the first
/// error propagates once. A user abort cancels in-flight transfers as well
/// and always wins over other errors.
pub async fn upload_parts(
    file_path: &Path,
    plans: Vec<PartPlan>,
    concurrency: usize,
    progress: &TransferProgress,
    client: &Client,
    cancel: &CancellationToken,
) -> Result<Vec<PartResult>> {
    anyhow::ensure!(concurrency > 0, "part concurrency must be positive");
    if plans.is_empty() {
        return Ok(Vec::new());
    }

    let total_parts = plans.len();
    let plans = Arc::new(plans);
    let next_part = Arc::new(AtomicUsize::new(0));
    // Dispatch halts on user abort (parent token) or first worker failure.
    let stop = cancel.child_token();

    let worker_count = concurrency.min(total_parts);
    let mut workers = Vec::with_capacity(worker_count);

    for _ in 0..worker_count {
        let plans = Arc::clone(&plans);
        let next_part = Arc::clone(&next_part);
        let stop = stop.clone();
        let cancel = cancel.clone();
        let client = client.clone();
        let progress = progress.clone();
        let file_path = file_path.to_path_buf();

        workers.push(tokio::spawn(async move {
            let mut completed = Vec::new();
            loop {
                if stop.is_cancelled() {
                    break;
                }
                let index = next_part.fetch_add(1, Ordering::SeqCst);
                if index >= plans.len() {
                    break;
                }
                let plan = &plans[index];

                match upload_part(&file_path, plan, &client, &cancel).await {
                    Ok(result) => {
                        if let Err(err) = progress.record_part_bytes(result.bytes_sent) {
                            log::warn!("Failed to update upload progress: {err}");
                        }
                        completed.push(result);
                    }
                    Err(err) => {
                        stop.cancel();
                        return Err(err.context(format!(
                            "Failed to upload part {}/{}",
                            plan.part_number, total_parts
                        )));
                    }
                }
            }
            Ok(completed)
        }));
    }

    let mut results = Vec::with_capacity(total_parts);
    let mut first_error: Option<anyhow::Error> = None;

    for worker in join_all(workers).await {
        match worker.context("Upload worker panicked")? {
            Ok(completed) => results.extend(completed),
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(UploadClientError::Aborted.into());
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    results.sort_by_key(|result| result.part_number);

    let mut expected: Vec<u64> = plans.iter().map(|plan| plan.part_number).collect();
    expected.sort_unstable();
    let actual: Vec<u64> = results.iter().map(|result| result.part_number).collect();
    anyhow::ensure!(
        expected == actual,
        "part results do not cover the plan exactly once"
    );

    Ok(results)
}

fn extract_etag(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("etag")
        .and_then(|header| header.to_str().ok())
        .map(|etag| etag.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_aborted;

    fn plan(part_number: u64, offset: u64, len: u64) -> PartPlan {
        PartPlan {
            part_number,
            url: format!("http://storage/part{part_number}"),
            offset,
            len,
        }
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_aborts_without_dispatch() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let progress = TransferProgress::new_noop(30);
        let client = Client::new();
        let plans = vec![plan(1, 0, 10), plan(2, 10, 10), plan(3, 20, 10)];

        let err = upload_parts(
            Path::new("/nonexistent"),
            plans,
            3,
            &progress,
            &client,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(is_aborted(&err));
        assert_eq!(progress.uploaded_bytes(), 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_aborts_single_part_upload() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = Client::new();
        let err = upload_part(Path::new("/nonexistent"), &plan(1, 0, 10), &client, &cancel)
            .await
            .unwrap_err();
        assert!(is_aborted(&err));
    }

    #[tokio::test]
    async fn test_empty_plan_yields_no_results() {
        let cancel = CancellationToken::new();
        let progress = TransferProgress::new_noop(0);
        let client = Client::new();

        let results = upload_parts(Path::new("/nonexistent"), vec![], 3, &progress, &client, &cancel)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
