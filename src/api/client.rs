use crate::api::models::upload::{
    CompletedPart, CompleteUploadRequest, CompleteUploadResponse, ExtractionStatusResponse,
    IngestProgressResponse, InitUploadRequest, InitUploadResponse,
};
use crate::config::Config;
use crate::error::UploadClientError;
use crate::types::Result;
use anyhow::Context;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    transfer_client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(None)
    }

    pub fn with_base_url(url_override: Option<String>) -> Result<Self> {
        let cli_version = env!("CARGO_PKG_VERSION");
        let user_agent = format!("UFDR-Upload-CLI/{cli_version}");

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_str(&user_agent).context("Invalid user agent")?,
        );

        let client = build_api_client_with_headers(Some(headers.clone()))?;
        let transfer_client = build_transfer_client_with_headers(Some(headers))?;

        let base_url = Config::get_api_url(url_override)?
            .trim_end_matches('/')
            .to_string();

        debug!("ApiClient configured base_url={base_url}");

        Ok(Self {
            client,
            transfer_client,
            base_url,
        })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }

    pub fn transfer_client(&self) -> &Client {
        &self.transfer_client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn get<T>(&self, endpoint: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self.build_url(endpoint);
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(UploadClientError::from)?;
        self.parse_json_response(response).await
    }

    pub async fn post<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.build_url(endpoint);
        debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(UploadClientError::from)?;
        self.parse_json_response(response).await
    }

    pub async fn put<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.build_url(endpoint);
        debug!("PUT {url}");
        let response = self
            .client
            .put(&url)
            .json(body)
            .send()
            .await
            .map_err(UploadClientError::from)?;
        self.parse_json_response(response).await
    }

    pub async fn parse_json_response<T>(&self, response: Response) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        if response.status().is_success() {
            response
                .json()
                .await
                .context("Failed to parse JSON response")
        } else {
            Err(self.create_error_from_response(response).await)
        }
    }

    async fn create_error_from_response(&self, response: Response) -> anyhow::Error {
        let status = response.status();
        let url = response.url().clone();
        let error_body = response.text().await.unwrap_or_default();

        debug!("Request to {url} failed: HTTP {status} - {error_body}");

        match status {
            StatusCode::NOT_FOUND => {
                UploadClientError::ApiError(format!("Not found: {url}")).into()
            }
            _ => UploadClientError::ApiError(format!(
                "HTTP {} - {}",
                status,
                if error_body.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown error")
                } else {
                    &error_body
                }
            ))
            .into(),
        }
    }

    /// Opens a multipart upload session for the given file.
    pub async fn init_upload(
        &self,
        filename: &str,
        size: u64,
        session_id: &str,
    ) -> Result<InitUploadResponse> {
        let request = InitUploadRequest {
            filename: filename.to_string(),
            size,
            session_id: session_id.to_string(),
        };
        self.post("/api/uploads/init", &request).await
    }

    /// Tells the backend all parts are uploaded and hands back the
    /// collected validation tokens so it can assemble the final object.
    pub async fn complete_upload(
        &self,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<CompleteUploadResponse> {
        let request = CompleteUploadRequest { parts };
        self.put(&format!("/api/uploads/{upload_id}/complete"), &request)
            .await
    }

    pub async fn extraction_status(&self, upload_id: &str) -> Result<ExtractionStatusResponse> {
        self.get(&format!("/api/uploads/{upload_id}/extraction-status"))
            .await
    }

    /// Legacy polling contract. The extraction-status endpoint is the
    /// canonical one; this remains only for `status --legacy`.
    pub async fn ingest_progress(&self, upload_id: &str) -> Result<IngestProgressResponse> {
        self.get(&format!("/api/uploads/{upload_id}/ingest-progress"))
            .await
    }
}

fn is_test_mode() -> bool {
    std::env::var("UFDR_TEST_MODE")
        .map(|value| value == "1")
        .unwrap_or(false)
}

fn build_api_client_with_headers(headers: Option<reqwest::header::HeaderMap>) -> Result<Client> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .redirect(reqwest::redirect::Policy::limited(4))
        .use_rustls_tls();

    if is_test_mode() {
        builder = builder
            .connect_timeout(Duration::from_millis(200))
            .timeout(Duration::from_secs(2));
    } else {
        builder = builder
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(30));
    }

    if let Some(headers) = headers {
        builder = builder.default_headers(headers);
    }

    builder.build().context("Failed to build HTTP client")
}

fn build_transfer_client_with_headers(
    headers: Option<reqwest::header::HeaderMap>,
) -> Result<Client> {
    let mut builder = reqwest::Client::builder()
        .http1_only()
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .tcp_nodelay(true)
        .no_gzip()
        .no_brotli()
        .no_deflate()
        .redirect(reqwest::redirect::Policy::limited(4))
        .use_rustls_tls();

    if is_test_mode() {
        builder = builder
            .connect_timeout(Duration::from_millis(200))
            .timeout(Duration::from_secs(10));
    } else {
        builder = builder
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(300));
    }

    if let Some(headers) = headers {
        builder = builder.default_headers(headers);
    }

    builder
        .build()
        .context("Failed to build transfer HTTP client")
}
