//! PDF parsing via an external asynchronous job service
//!
//! The service converts PDF bytes to markdown through a submit → poll →
//! fetch-result job API. The result payload is stringly typed upstream: it
//! may be raw markdown or one of several JSON envelopes, so decoding is
//! isolated in [`unwrap_markdown`].

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use verdant_common::config::ParsingConfig;
use verdant_common::errors::{AppError, Result};

/// Terminal and non-terminal states of a parse job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseJobState {
    Pending,
    Success,
    Failed { error: String },
}

/// Trait for the external parse-job service
#[async_trait]
pub trait ParseJobClient: Send + Sync {
    /// Upload document bytes, returning the job identifier
    async fn submit(&self, bytes: &[u8], filename: &str) -> Result<String>;

    /// Current state of a job
    async fn status(&self, job_id: &str) -> Result<ParseJobState>;

    /// Fetch the markdown result payload of a successful job
    async fn result(&self, job_id: &str) -> Result<String>;
}

/// LlamaParse-style HTTP client
pub struct LlamaParseClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    job_id: Option<String>,
    id: Option<String>,
}

#[derive(Deserialize)]
struct JobResponse {
    status: Option<String>,
    error: Option<String>,
}

impl LlamaParseClient {
    pub fn new(config: &ParsingConfig, request_timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build parse-job client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ParseJobClient for LlamaParseClient {
    async fn submit(&self, bytes: &[u8], filename: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(|e| AppError::ParseJobFailed {
                message: e.to_string(),
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/parsing/upload", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::ParseJobFailed {
                message: format!("upload failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::ParseJobFailed {
                message: format!("upload failed: status {}", response.status()),
            });
        }

        let upload: UploadResponse =
            response.json().await.map_err(|e| AppError::ParseJobFailed {
                message: format!("upload response parse error: {}", e),
            })?;

        upload
            .job_id
            .or(upload.id)
            .ok_or_else(|| AppError::ParseJobFailed {
                message: "job_id missing from upload response".into(),
            })
    }

    async fn status(&self, job_id: &str) -> Result<ParseJobState> {
        let response = self
            .client
            .get(format!("{}/parsing/job/{}", self.api_base, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ParseJobFailed {
                message: format!("get job failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::ParseJobFailed {
                message: format!("get job failed: status {}", response.status()),
            });
        }

        let job: JobResponse = response.json().await.map_err(|e| AppError::ParseJobFailed {
            message: format!("get job parse error: {}", e),
        })?;

        let status = job.status.unwrap_or_default().to_uppercase();
        Ok(match status.as_str() {
            "SUCCESS" => ParseJobState::Success,
            "FAILED" | "ERROR" => ParseJobState::Failed {
                error: job.error.unwrap_or_else(|| "unknown".into()),
            },
            _ => ParseJobState::Pending,
        })
    }

    async fn result(&self, job_id: &str) -> Result<String> {
        let primary = format!("{}/parsing/job/{}/result/markdown", self.api_base, job_id);
        let mut response = self
            .client
            .get(&primary)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ParseJobFailed {
                message: format!("result fetch failed: {}", e),
            })?;

        // Some accounts only expose the raw variant
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            let fallback = format!(
                "{}/parsing/job/{}/result/raw/markdown",
                self.api_base, job_id
            );
            response = self
                .client
                .get(&fallback)
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| AppError::ParseJobFailed {
                    message: format!("result fetch failed: {}", e),
                })?;
        }

        if !response.status().is_success() {
            return Err(AppError::ParseJobFailed {
                message: format!("result fetch failed: status {}", response.status()),
            });
        }

        response.text().await.map_err(|e| AppError::ParseJobFailed {
            message: format!("result fetch failed: {}", e),
        })
    }
}

/// Decode the result payload into per-page markdown units.
///
/// Known envelope shapes, tried in order:
/// 1. `{"markdown": "..."}`
/// 2. `{"pages": [{"markdown": "..."}, ...]}`
/// 3. `[{...}, ...]`, a list mixing shapes 1 and 2
///
/// Anything else (including unparseable JSON) is treated as raw markdown.
pub fn unwrap_markdown(payload: &str) -> Vec<String> {
    let trimmed = payload.trim();

    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return vec![trimmed.to_string()];
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return vec![trimmed.to_string()],
    };

    if let Some(md) = value.get("markdown").and_then(|m| m.as_str()) {
        return vec![md.to_string()];
    }

    if let Some(pages) = value.get("pages").and_then(|p| p.as_array()) {
        let units = page_markdowns(pages);
        if !units.is_empty() {
            return units;
        }
    }

    if let Some(items) = value.as_array() {
        let mut units = Vec::new();
        for item in items {
            if let Some(md) = item.get("markdown").and_then(|m| m.as_str()) {
                units.push(md.to_string());
            } else if let Some(pages) = item.get("pages").and_then(|p| p.as_array()) {
                units.extend(page_markdowns(pages));
            }
        }
        if !units.is_empty() {
            return units;
        }
    }

    vec![trimmed.to_string()]
}

fn page_markdowns(pages: &[serde_json::Value]) -> Vec<String> {
    pages
        .iter()
        .filter_map(|p| p.get("markdown").and_then(|m| m.as_str()))
        .map(str::to_string)
        .collect()
}

/// Prefix a synthetic page heading on any unit that lacks one
fn ensure_page_headings(units: Vec<String>) -> Vec<String> {
    units
        .into_iter()
        .enumerate()
        .map(|(i, u)| {
            if u.starts_with("# ") {
                u
            } else {
                format!("# Page {}\n\n{}", i + 1, u)
            }
        })
        .collect()
}

/// Run the full submit → poll → fetch flow for one PDF.
///
/// Polls at `config.poll_interval_ms` under a `config.timeout_ms` wall-clock
/// budget. The sleep is the only suspension point in the system.
pub async fn parse_pdf(
    client: &dyn ParseJobClient,
    bytes: &[u8],
    filename: &str,
    config: &ParsingConfig,
) -> Result<Vec<String>> {
    let job_id = client.submit(bytes, filename).await?;
    debug!(job_id = %job_id, filename, size = bytes.len(), "parse job submitted");

    let interval = Duration::from_millis(config.poll_interval_ms);
    let deadline = tokio::time::Instant::now() + Duration::from_millis(config.timeout_ms);

    loop {
        match client.status(&job_id).await? {
            ParseJobState::Success => break,
            ParseJobState::Failed { error } => {
                return Err(AppError::ParseJobFailed { message: error });
            }
            ParseJobState::Pending => {
                if tokio::time::Instant::now() >= deadline {
                    return Err(AppError::ParseTimeout {
                        seconds: config.timeout_ms / 1000,
                    });
                }
                tokio::time::sleep(interval).await;
            }
        }
    }

    let payload = client.result(&job_id).await?;
    let units = ensure_page_headings(unwrap_markdown(&payload));

    if units.is_empty() || units.iter().all(|u| u.trim().is_empty()) {
        return Err(AppError::ParseEmptyResult);
    }

    debug!(job_id = %job_id, count = units.len(), "parse job complete");
    Ok(units)
}

/// Scripted parse-job client for tests
pub struct MockParseJob {
    statuses: std::sync::Mutex<std::collections::VecDeque<ParseJobState>>,
    payload: std::sync::Mutex<String>,
    polls: std::sync::atomic::AtomicUsize,
}

impl MockParseJob {
    /// A job that reports the given states in order, then the payload
    pub fn new(statuses: Vec<ParseJobState>, payload: &str) -> Self {
        Self {
            statuses: std::sync::Mutex::new(statuses.into()),
            payload: std::sync::Mutex::new(payload.to_string()),
            polls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A job that succeeds on the first poll
    pub fn immediate(payload: &str) -> Self {
        Self::new(vec![ParseJobState::Success], payload)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ParseJobClient for MockParseJob {
    async fn submit(&self, _bytes: &[u8], _filename: &str) -> Result<String> {
        Ok("job-1".to_string())
    }

    async fn status(&self, _job_id: &str) -> Result<ParseJobState> {
        self.polls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        // Last scripted state repeats once the queue drains
        let mut statuses = self.statuses.lock().unwrap();
        Ok(match statuses.len() {
            0 => ParseJobState::Pending,
            1 => statuses.front().cloned().unwrap(),
            _ => statuses.pop_front().unwrap(),
        })
    }

    async fn result(&self, _job_id: &str) -> Result<String> {
        Ok(self.payload.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> ParsingConfig {
        ParsingConfig {
            poll_interval_ms: 1,
            timeout_ms: 50,
            ..ParsingConfig::default()
        }
    }

    #[test]
    fn test_unwrap_raw_markdown() {
        let units = unwrap_markdown("# Title\n\nBody text");
        assert_eq!(units, vec!["# Title\n\nBody text".to_string()]);
    }

    #[test]
    fn test_unwrap_single_field_envelope() {
        let units = unwrap_markdown(r##"{"markdown": "# Doc\ncontent"}"##);
        assert_eq!(units, vec!["# Doc\ncontent".to_string()]);
    }

    #[test]
    fn test_unwrap_pages_envelope() {
        let payload = r#"{"pages": [{"markdown": "page one"}, {"markdown": "page two"}, {"other": 1}]}"#;
        let units = unwrap_markdown(payload);
        assert_eq!(units, vec!["page one".to_string(), "page two".to_string()]);
    }

    #[test]
    fn test_unwrap_mixed_list_envelope() {
        let payload = r#"[{"markdown": "a"}, {"pages": [{"markdown": "b"}, {"markdown": "c"}]}]"#;
        let units = unwrap_markdown(payload);
        assert_eq!(units, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_unwrap_unknown_json_falls_back_to_raw() {
        let payload = r#"{"something": "else"}"#;
        assert_eq!(unwrap_markdown(payload), vec![payload.to_string()]);
    }

    #[test]
    fn test_unwrap_invalid_json_falls_back_to_raw() {
        let payload = "{not json";
        assert_eq!(unwrap_markdown(payload), vec![payload.to_string()]);
    }

    #[test]
    fn test_synthetic_page_headings() {
        let units = ensure_page_headings(vec![
            "# Already headed".to_string(),
            "bare page".to_string(),
        ]);
        assert_eq!(units[0], "# Already headed");
        assert_eq!(units[1], "# Page 2\n\nbare page");
    }

    #[tokio::test]
    async fn test_parse_pdf_polls_until_success() {
        let client = MockParseJob::new(
            vec![
                ParseJobState::Pending,
                ParseJobState::Pending,
                ParseJobState::Success,
            ],
            "# Page\ncontent",
        );

        let units = parse_pdf(&client, b"%PDF", "doc.pdf", &fast_config())
            .await
            .unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(client.poll_count(), 3);
    }

    #[tokio::test]
    async fn test_parse_pdf_job_failure() {
        let client = MockParseJob::new(
            vec![ParseJobState::Failed {
                error: "corrupt file".into(),
            }],
            "",
        );

        let err = parse_pdf(&client, b"%PDF", "doc.pdf", &fast_config())
            .await
            .unwrap_err();
        match err {
            AppError::ParseJobFailed { message } => assert_eq!(message, "corrupt file"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_pdf_times_out() {
        let client = MockParseJob::new(vec![ParseJobState::Pending], "");
        let config = ParsingConfig {
            poll_interval_ms: 1500,
            timeout_ms: 120_000,
            ..ParsingConfig::default()
        };

        let err = parse_pdf(&client, b"%PDF", "doc.pdf", &config)
            .await
            .unwrap_err();
        match err {
            AppError::ParseTimeout { seconds } => assert_eq!(seconds, 120),
            other => panic!("unexpected error: {:?}", other),
        }
        // ~120s budget at 1.5s per poll
        assert!(client.poll_count() >= 80);
    }

    #[tokio::test]
    async fn test_parse_pdf_empty_result() {
        let client = MockParseJob::immediate("   ");
        let err = parse_pdf(&client, b"%PDF", "doc.pdf", &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ParseEmptyResult));
    }

    #[tokio::test]
    async fn test_three_page_pdf_yields_three_units() {
        let payload = r#"{"pages": [{"markdown": "one"}, {"markdown": "two"}, {"markdown": "three"}]}"#;
        let client = MockParseJob::immediate(payload);

        let units = parse_pdf(&client, b"%PDF", "doc.pdf", &fast_config())
            .await
            .unwrap();
        assert_eq!(units.len(), 3);
        assert!(units[0].starts_with("# Page 1"));
        assert!(units[2].starts_with("# Page 3"));
    }
}
