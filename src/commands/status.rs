use crate::api::models::upload::OverallStatus;
use crate::api::ApiClient;
use crate::poller::{poll_extraction_status, POLL_INTERVAL};
use crate::ui;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

pub struct StatusArgs {
    pub upload_id: String,
    pub watch: bool,
    pub legacy: bool,
    pub api_url: Option<String>,
}

pub async fn execute(args: StatusArgs) -> Result<()> {
    let api = ApiClient::with_base_url(args.api_url)?;

    if args.legacy {
        ui::warn("ingest-progress is deprecated; prefer the default extraction status");
        let progress = api.ingest_progress(&args.upload_id).await?;
        ui::info(&format!(
            "Ingest progress: {}/{} ({})",
            progress.processed,
            progress.total,
            progress.status.as_deref().unwrap_or("unknown")
        ));
        return Ok(());
    }

    let status = if args.watch {
        let cancel = CancellationToken::new();
        let ctrl_c_cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c_cancel.cancel();
            }
        });
        poll_extraction_status(&api, &args.upload_id, POLL_INTERVAL, &cancel).await?
    } else {
        api.extraction_status(&args.upload_id).await?
    };

    match status.error_message {
        Some(message) => ui::info(&format!(
            "Extraction status: {} ({message})",
            status.overall_status
        )),
        None => ui::info(&format!("Extraction status: {}", status.overall_status)),
    }

    if status.overall_status == OverallStatus::Failed {
        anyhow::bail!("Extraction failed");
    }

    Ok(())
}
