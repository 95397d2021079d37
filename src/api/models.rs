use serde::{Deserialize, Serialize};

pub mod upload {
    use super::*;

    #[derive(Debug, Serialize, Clone)]
    pub struct InitUploadRequest {
        pub filename: String,
        pub size: u64,
        pub session_id: String,
    }

    #[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
    pub struct PartUrl {
        pub part_number: u64,
        pub url: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct InitUploadResponse {
        #[serde(default)]
        pub upload_id: Option<String>,
        #[serde(default)]
        pub parts: Vec<PartUrl>,
        #[serde(default)]
        pub total_parts: Option<u64>,
        #[serde(default)]
        pub part_size: Option<u64>,
    }

    #[derive(Debug, Serialize, Clone, PartialEq, Eq)]
    pub struct CompletedPart {
        pub part_number: u64,
        // Serialized as null when the storage backend omitted the ETag header.
        pub etag: Option<String>,
    }

    #[derive(Debug, Serialize, Clone)]
    pub struct CompleteUploadRequest {
        pub parts: Vec<CompletedPart>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct CompleteUploadResponse {
        #[serde(default)]
        pub status: Option<String>,
        #[serde(default)]
        pub error: Option<String>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
    #[serde(rename_all = "lowercase")]
    pub enum OverallStatus {
        Pending,
        Processing,
        Completed,
        Failed,
    }

    impl OverallStatus {
        pub fn is_terminal(&self) -> bool {
            matches!(self, OverallStatus::Completed | OverallStatus::Failed)
        }
    }

    impl std::fmt::Display for OverallStatus {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let s = match self {
                OverallStatus::Pending => "pending",
                OverallStatus::Processing => "processing",
                OverallStatus::Completed => "completed",
                OverallStatus::Failed => "failed",
            };
            write!(f, "{s}")
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ExtractionStatusResponse {
        pub overall_status: OverallStatus,
        #[serde(default)]
        pub error_message: Option<String>,
    }

    /// Response of the legacy ingest-progress endpoint. Superseded by
    /// [`ExtractionStatusResponse`]; kept for `status --legacy` only.
    #[derive(Debug, Clone, Deserialize)]
    pub struct IngestProgressResponse {
        #[serde(default)]
        pub processed: u64,
        #[serde(default)]
        pub total: u64,
        #[serde(default)]
        pub status: Option<String>,
    }
}

#[cfg(test)]
mod tests {
    use super::upload::*;

    #[test]
    fn test_init_request_serializes_all_fields() {
        let request = InitUploadRequest {
            filename: "report.ufdr".to_string(),
            size: 26_214_400,
            session_id: "cli-session".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["filename"], "report.ufdr");
        assert_eq!(json["size"], 26_214_400u64);
        assert_eq!(json["session_id"], "cli-session");
    }

    #[test]
    fn test_init_response_tolerates_missing_optional_fields() {
        let response: InitUploadResponse =
            serde_json::from_str(r#"{"upload_id":"u-1","parts":[{"part_number":1,"url":"http://s/p1"}]}"#)
                .unwrap();
        assert_eq!(response.upload_id.as_deref(), Some("u-1"));
        assert_eq!(response.parts.len(), 1);
        assert!(response.total_parts.is_none());
        assert!(response.part_size.is_none());
    }

    #[test]
    fn test_completed_part_serializes_missing_etag_as_null() {
        let part = CompletedPart {
            part_number: 2,
            etag: None,
        };
        let json = serde_json::to_value(&part).unwrap();
        assert!(json["etag"].is_null());
    }

    #[test]
    fn test_overall_status_parsing_and_terminality() {
        let status: ExtractionStatusResponse =
            serde_json::from_str(r#"{"overall_status":"processing"}"#).unwrap();
        assert_eq!(status.overall_status, OverallStatus::Processing);
        assert!(!status.overall_status.is_terminal());

        let status: ExtractionStatusResponse =
            serde_json::from_str(r#"{"overall_status":"failed","error_message":"corrupt archive"}"#)
                .unwrap();
        assert!(status.overall_status.is_terminal());
        assert_eq!(status.error_message.as_deref(), Some("corrupt archive"));
    }

    #[test]
    fn test_ingest_progress_defaults() {
        let progress: IngestProgressResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(progress.processed, 0);
        assert_eq!(progress.total, 0);
        assert!(progress.status.is_none());
    }
}
