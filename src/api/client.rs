use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::types::{DashboardStats, JobPage, PageQuery, ReportJob};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Anything that can list and delete report jobs. The poller only talks to
/// this trait so tests can script responses without a server.
pub trait JobSource: Send + Sync + 'static {
    fn list_jobs(
        &self,
        query: PageQuery,
    ) -> impl Future<Output = Result<JobPage, ApiError>> + Send;

    fn delete_job(&self, id: u64) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Source of dashboard statistics for the live dashboard monitor.
pub trait StatsSource: Send + Sync + 'static {
    fn dashboard_stats(&self) -> impl Future<Output = Result<DashboardStats, ApiError>> + Send;
}

pub struct ReportsClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ReportsClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Absolute locators are used as is; anything else is joined to the base URL.
    fn resolve(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            locator.to_string()
        } else {
            self.url(locator)
        }
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("accept", "application/json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        tracing::debug!(%url, "GET");
        let response = self
            .authorized(self.client.get(&url).query(query))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn list_jobs(&self, query: PageQuery) -> Result<JobPage, ApiError> {
        self.get_json(
            self.url("reports/jobs"),
            &[
                ("page", query.page.to_string()),
                ("per_page", query.per_page.to_string()),
            ],
        )
        .await
    }

    pub async fn get_job(&self, id: u64) -> Result<ReportJob, ApiError> {
        self.get_json(self.url(&format!("reports/jobs/{id}")), &[]).await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get_json(self.url("dashboard/stats"), &[]).await
    }

    /// Fetch the generated file of a completed job.
    pub async fn download(&self, job: &ReportJob) -> Result<Vec<u8>, ApiError> {
        let locator = match (&job.download_url, job.is_downloadable()) {
            (Some(locator), true) => locator,
            _ => return Err(ApiError::NotAvailable(job.id)),
        };
        let url = self.resolve(locator);
        tracing::debug!(%url, job_id = job.id, "downloading report");
        let response = self.authorized(self.client.get(&url)).send().await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn delete_job(&self, id: u64) -> Result<(), ApiError> {
        let url = self.url(&format!("reports/jobs/{id}"));
        tracing::debug!(%url, "DELETE");
        let response = self.authorized(self.client.delete(&url)).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Map a non-success response to an [`ApiError`], keeping the server's
/// `message` field when the body carries one.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        let message = body_message(response).await;
        tracing::warn!(?retry_after_secs, "rate limit exceeded");
        return Err(ApiError::RateLimited {
            retry_after_secs,
            message,
        });
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized {
            message: body_message(response).await,
        });
    }

    Err(ApiError::Status {
        status: status.as_u16(),
        message: body_message(response).await,
    })
}

/// `Retry-After` as seconds from `now`. The header is either a number of
/// seconds or an HTTP-date; a date in the past means "now".
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let secs = (at.with_timezone(&Utc) - now).num_seconds().max(0);
    u64::try_from(secs).ok()
}

async fn body_message(response: Response) -> Option<String> {
    let text = response.text().await.ok()?;
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

impl JobSource for ReportsClient {
    async fn list_jobs(&self, query: PageQuery) -> Result<JobPage, ApiError> {
        ReportsClient::list_jobs(self, query).await
    }

    async fn delete_job(&self, id: u64) -> Result<(), ApiError> {
        ReportsClient::delete_job(self, id).await
    }
}

impl StatsSource for ReportsClient {
    async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        ReportsClient::dashboard_stats(self).await
    }
}
