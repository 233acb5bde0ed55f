use std::time::Duration;

use hubsync_common::error::{HubsyncError, HubsyncResult};
use hubsync_db::records::models::EntityType;
use reqwest::{Client, StatusCode};

use super::models::{ObjectPage, SourceRecord};
use super::query::{build_search_request, FetchWindow, SearchRequest};

/// Upstream cap on records per page.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct CrmClientConfig {
    pub base_url: String,
    pub access_token: String,
    pub page_size: u32,
    /// Total attempts per page, first try included.
    pub max_attempts: u32,
    /// Fixed wait between attempts after a throttled or transient failure.
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl CrmClientConfig {
    /// Load CRM API config from environment.
    ///
    /// `CRM_ACCESS_TOKEN` is mandatory; everything else has a default.
    pub fn from_env() -> HubsyncResult<Self> {
        let access_token = std::env::var("CRM_ACCESS_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                HubsyncError::Config("CRM_ACCESS_TOKEN is required but not set".to_string())
            })?;

        let base_url = std::env::var("CRM_BASE_URL")
            .unwrap_or_else(|_| "https://api.hubapi.com".to_string())
            .trim_end_matches('/')
            .to_string();
        let page_size = env_or("CRM_PAGE_SIZE", MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let max_attempts = env_or("CRM_MAX_ATTEMPTS", 3).max(1);
        let retry_delay_ms = env_or("CRM_RETRY_DELAY_MS", 10_000);
        let timeout_secs = env_or("CRM_TIMEOUT_SECS", 30);

        Ok(Self {
            base_url,
            access_token,
            page_size,
            max_attempts,
            retry_delay_ms,
            timeout_secs,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Clone)]
pub struct CrmClient {
    client: Client,
    config: CrmClientConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum CrmClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,

    #[error("failed to decode page: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl CrmClientError {
    /// Whether the same page may be requested again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::RequestError(e) => e.is_timeout() || e.is_connect(),
            Self::HttpError { .. } | Self::Decode(_) | Self::MaxRetriesExceeded { .. } => false,
        }
    }
}

enum PageRequest<'a> {
    List {
        properties: &'a str,
        after: Option<&'a str>,
    },
    Search(&'a SearchRequest),
}

impl CrmClient {
    pub fn new(config: CrmClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch every record of `entity` inside `window`, following cursors page
    /// by page until upstream stops returning one.
    ///
    /// An unbounded window walks the plain listing; any bound switches to the
    /// search endpoint.
    pub async fn fetch_records(
        &self,
        entity: EntityType,
        properties: &[&str],
        window: &FetchWindow,
    ) -> Result<Vec<SourceRecord>, CrmClientError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        let joined_properties = properties.join(",");
        let mut search = (!window.is_unbounded())
            .then(|| build_search_request(entity, properties, window, self.config.page_size));

        loop {
            let request = match search.as_mut() {
                Some(body) => {
                    body.after = cursor.clone();
                    PageRequest::Search(body)
                }
                None => PageRequest::List {
                    properties: &joined_properties,
                    after: cursor.as_deref(),
                },
            };

            let page = self.fetch_page_with_retry(entity, &request).await?;
            pages += 1;

            let next = page.next_cursor().map(str::to_string);
            records.extend(page.results.into_iter().map(SourceRecord::from));

            tracing::debug!(
                entity = %entity,
                page = pages,
                total = records.len(),
                has_more = next.is_some(),
                "fetched crm page"
            );

            match next {
                Some(after) => cursor = Some(after),
                None => break,
            }
        }

        tracing::info!(entity = %entity, pages, records = records.len(), "crm fetch complete");
        Ok(records)
    }

    async fn fetch_page_with_retry(
        &self,
        entity: EntityType,
        request: &PageRequest<'_>,
    ) -> Result<ObjectPage, CrmClientError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.send_page(entity, request).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() => {
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        tracing::warn!(
                            entity = %entity,
                            attempt,
                            max_attempts,
                            delay_ms = self.config.retry_delay_ms,
                            error = %last_error,
                            "retrying crm page after fixed delay"
                        );
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms))
                            .await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(CrmClientError::MaxRetriesExceeded {
            attempts: max_attempts,
            last_error,
        })
    }

    async fn send_page(
        &self,
        entity: EntityType,
        request: &PageRequest<'_>,
    ) -> Result<ObjectPage, CrmClientError> {
        let base = format!(
            "{}/crm/v3/objects/{}",
            self.config.base_url,
            entity.object_path()
        );

        let builder = match request {
            PageRequest::List { properties, after } => {
                let mut query: Vec<(&str, String)> = vec![
                    ("limit", self.config.page_size.to_string()),
                    ("archived", "false".to_string()),
                ];
                if !properties.is_empty() {
                    query.push(("properties", properties.to_string()));
                }
                if let Some(after) = after {
                    query.push(("after", after.to_string()));
                }
                self.client.get(&base).query(&query)
            }
            PageRequest::Search(body) => self.client.post(format!("{base}/search")).json(body),
        };

        let response = builder
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            return serde_json::from_str::<ObjectPage>(&text)
                .map_err(|e| CrmClientError::Decode(e.to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CrmClientError::RateLimited);
        }

        // Anything else is fatal for this page; keep the body for diagnostics.
        let body = response.text().await.unwrap_or_default();
        Err(CrmClientError::HttpError { status, body })
    }
}
