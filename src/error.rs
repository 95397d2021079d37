use std::fmt;

#[derive(Debug)]
pub enum UploadClientError {
    ConfigNotFound,
    Plan(String),
    Transfer { status: u16, body: String },
    Aborted,
    Poll(String),
    FileTooLarge { size: u64, limit: u64 },
    ApiError(String),
    IoError(String),
    NetworkError(String),
    ConnectionError(String),
}

impl fmt::Display for UploadClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadClientError::ConfigNotFound => write!(
                f,
                "Config file not found. Please run 'ufdr-upload config set api_url <url>' first"
            ),
            UploadClientError::Plan(msg) => write!(f, "Invalid upload plan: {msg}"),
            UploadClientError::Transfer { status, body } => {
                if body.is_empty() {
                    write!(f, "Transfer failed: HTTP {status}")
                } else {
                    write!(f, "Transfer failed: HTTP {status} - {body}")
                }
            }
            UploadClientError::Aborted => write!(f, "Upload aborted"),
            UploadClientError::Poll(msg) => write!(f, "Status poll failed: {msg}"),
            UploadClientError::FileTooLarge { size, limit } => write!(
                f,
                "File is too large ({size} bytes, limit {limit} bytes)"
            ),
            UploadClientError::ApiError(msg) => write!(f, "API Error: {msg}"),
            UploadClientError::IoError(msg) => write!(f, "IO Error: {msg}"),
            UploadClientError::NetworkError(msg) => write!(f, "Network Error: {msg}"),
            UploadClientError::ConnectionError(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for UploadClientError {}

pub fn is_connection_error(err: &anyhow::Error) -> bool {
    let err_str = err.to_string().to_lowercase();
    err_str.contains("cannot connect")
        || err_str.contains("connection refused")
        || err_str.contains("timed out")
        || err_str.contains("timeout")
}

pub fn is_aborted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<UploadClientError>(),
            Some(UploadClientError::Aborted)
        )
    })
}

impl From<std::io::Error> for UploadClientError {
    fn from(err: std::io::Error) -> Self {
        UploadClientError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for UploadClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            UploadClientError::ConnectionError(
                "ERROR: Cannot connect to the ingest server. Please check:\n\
                 • Is the API URL correct? (Check with: ufdr-upload config list)\n\
                 • Is the backend running and reachable?"
                    .to_string(),
            )
        } else if err.is_timeout() {
            UploadClientError::ConnectionError(
                "TIMEOUT: Connection timed out. The server might be overloaded or unreachable."
                    .to_string(),
            )
        } else if err.is_request() {
            UploadClientError::NetworkError(format!("Request failed: {err}"))
        } else {
            UploadClientError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UploadClientError {
    fn from(err: serde_json::Error) -> Self {
        UploadClientError::ApiError(format!("JSON parsing error: {err}"))
    }
}
