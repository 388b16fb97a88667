use std::path::{Path, PathBuf};

use crate::api::{ApiError, ReportJob, ReportsClient};
use crate::error::AppError;
use crate::notify::{Notice, Notifier};

/// Download a completed report into `dir` as `{type}-{id}.{format}`.
///
/// Every failure is notified before it is returned: a job without a file
/// never reaches the network, and a failed request shows the server's
/// message when it sent one.
pub async fn download_report(
    client: &ReportsClient,
    job: &ReportJob,
    dir: &Path,
    notifier: &dyn Notifier,
) -> Result<PathBuf, AppError> {
    if !job.is_downloadable() {
        notifier.notify(Notice::error("Error", "File not available for download"));
        return Err(ApiError::NotAvailable(job.id).into());
    }

    let bytes = match client.download(job).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(job_id = job.id, error = %err, "report download failed");
            notifier.notify(Notice::error(
                "Error",
                err.server_message().unwrap_or("Failed to download file"),
            ));
            return Err(err.into());
        }
    };

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(job.file_name());
    tokio::fs::write(&path, &bytes).await?;
    tracing::info!(job_id = job.id, path = %path.display(), size = bytes.len(), "report saved");
    notifier.notify(Notice::info(
        "Download finished",
        format!("Saved {}", path.display()),
    ));
    Ok(path)
}
