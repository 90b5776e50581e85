//! HTTP job source for the queue REST API.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::config::FetchConfig;
use crate::error::FetchError;

use super::normalize::normalize_page;
use super::source::{JobPage, JobSource};

/// Longest response body kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Response body of the jobs endpoint: either a bare array or a wrapper
/// carrying the next cursor.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PageBody {
    Wrapped {
        jobs: Vec<Value>,
        #[serde(default, rename = "nextCursor")]
        next_cursor: Option<String>,
    },
    Bare(Vec<Value>),
}

/// Fetches `GET {base_url}/stages/{stage_id}/jobs?limit=..&cursor=..`.
pub struct HttpJobSource {
    client: reqwest::Client,
    base_url: Url,
    page_size: u32,
    timeout_secs: u64,
}

impl HttpJobSource {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let raw = config
            .base_url
            .as_deref()
            .ok_or(FetchError::MissingBaseUrl)?;
        let base_url = Url::parse(raw)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| FetchError::InvalidBaseUrl(raw.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("jobdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            page_size: config.page_size,
            timeout_secs: config.timeout_secs,
        })
    }

    /// `{base_url}/stages/{stage_id}/jobs`, with `stage_id` percent-encoded
    /// as a single path segment.
    pub fn stage_url(&self, stage_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["stages", stage_id, "jobs"]);
        }
        url
    }

    fn transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout_secs)
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Maps a non-success status to an error. 429 and 5xx are retryable.
pub(crate) fn classify_status(status: u16, body: &str) -> FetchError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    if status == 429 || status >= 500 {
        FetchError::Server { status, body }
    } else {
        FetchError::Client { status, body }
    }
}

pub(crate) fn parse_page(stage_id: &str, body: &str) -> Result<JobPage, FetchError> {
    let parsed: PageBody =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    let (raw, next_cursor) = match parsed {
        PageBody::Wrapped { jobs, next_cursor } => (jobs, next_cursor),
        PageBody::Bare(jobs) => (jobs, None),
    };

    let (jobs, skipped) = normalize_page(stage_id, &raw);
    Ok(JobPage {
        jobs,
        skipped,
        next_cursor: next_cursor.filter(|c| !c.is_empty()),
    })
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn fetch_page(
        &self,
        stage_id: &str,
        cursor: Option<&str>,
    ) -> Result<JobPage, FetchError> {
        let mut request = self
            .client
            .get(self.stage_url(stage_id))
            .query(&[("limit", self.page_size.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }

        let page = parse_page(stage_id, &body)?;
        log::debug!(
            "Fetched {} jobs from stage {} ({} skipped, more: {})",
            page.jobs.len(),
            stage_id,
            page.skipped,
            page.next_cursor.is_some()
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_base_url() {
        let config = FetchConfig::default();
        assert!(matches!(
            HttpJobSource::new(&config),
            Err(FetchError::MissingBaseUrl)
        ));
    }

    #[test]
    fn test_stage_url_trims_slash() {
        let config = FetchConfig {
            base_url: Some("https://queue.example.com/api/".to_string()),
            ..Default::default()
        };
        let source = HttpJobSource::new(&config).unwrap();
        assert_eq!(
            source.stage_url("scope1").as_str(),
            "https://queue.example.com/api/stages/scope1/jobs"
        );
    }

    #[test]
    fn test_stage_url_encodes_stage_id() {
        let config = FetchConfig {
            base_url: Some("https://queue.example.com".to_string()),
            ..Default::default()
        };
        let source = HttpJobSource::new(&config).unwrap();
        assert_eq!(
            source.stage_url("extract/scope 1?x").as_str(),
            "https://queue.example.com/stages/extract%2Fscope%201%3Fx/jobs"
        );
    }

    #[test]
    fn test_rejects_unparseable_base_url() {
        let config = FetchConfig {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            HttpJobSource::new(&config),
            Err(FetchError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(503, "down").is_retryable());
        assert!(classify_status(429, "slow down").is_retryable());
        assert!(!classify_status(404, "").is_retryable());
        assert!(!classify_status(401, "").is_retryable());

        let long = "x".repeat(2000);
        match classify_status(500, &long) {
            FetchError::Server { body, .. } => assert_eq!(body.len(), MAX_ERROR_BODY),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_wrapped_and_bare_pages() {
        let wrapped = r#"{
            "jobs": [
                { "id": "1", "data": { "entityKey": "acme", "threadId": "t" }, "timestamp": 0 },
                { "id": "2" }
            ],
            "nextCursor": "abc"
        }"#;
        let page = parse_page("scope1", wrapped).unwrap();
        assert_eq!(page.jobs.len(), 1);
        assert_eq!(page.skipped, 1);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));

        let bare = r#"[{ "id": "1", "entityKey": "acme", "threadId": "t", "timestamp": 0 }]"#;
        let page = parse_page("scope1", bare).unwrap();
        assert_eq!(page.jobs.len(), 1);
        assert!(page.next_cursor.is_none());

        assert!(matches!(
            parse_page("scope1", "<html>"),
            Err(FetchError::Decode(_))
        ));
    }
}
