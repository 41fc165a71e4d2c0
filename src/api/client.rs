//! HTTP client for the json-server style REST API.
//!
//! All paths are rooted at `{base_url}/api`. List endpoints accept
//! `_page`, `_limit`, `_sort`, `_order`, `q` and plain field filters, and
//! report the unpaged total in the `X-Total-Count` header. GET requests are
//! retried with exponential backoff on transient failures; writes fail fast.

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::api::error::ApiError;
use crate::config::ApiConfig;
use crate::models::{Page, PageMeta, PageRequest, SortOrder};

const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

/// Query parameters in request order
pub type QueryParams = Vec<(String, String)>;

/// Backoff settings for idempotent reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    fn strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// REST API client shared by the ticket and device services
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            RetryPolicy {
                max_retries: config.max_retries,
                initial_delay: Duration::from_millis(config.initial_backoff_ms),
                max_delay: Duration::from_millis(config.max_backoff_ms),
            },
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// GET a JSON document
    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: QueryParams) -> Result<T, ApiError> {
        let (body, _) = self.get_with_total(path, params).await?;
        Ok(body)
    }

    /// GET one page of a collection
    #[instrument(skip(self, page, filters), fields(page = page.page, limit = page.limit))]
    pub async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        page: &PageRequest,
        filters: QueryParams,
    ) -> Result<Page<T>, ApiError> {
        let params = build_list_query(page, filters);
        let (data, total_items) = self.get_with_total::<Vec<T>>(path, params).await?;

        Ok(Page {
            data,
            meta: PageMeta::from_total(page, total_items),
        })
    }

    pub async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.client.post(self.url(path)).json(body);
        let response = self.execute(Method::POST, path, request).await?;
        decode(response).await
    }

    pub async fn patch<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.client.patch(self.url(path)).json(body);
        let response = self.execute(Method::PATCH, path, request).await?;
        decode(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let request = self.client.delete(self.url(path));
        self.execute(Method::DELETE, path, request).await?;
        Ok(())
    }

    /// GET with retry, returning the body and the `X-Total-Count` header
    async fn get_with_total<T: DeserializeOwned>(
        &self,
        path: &str,
        params: QueryParams,
    ) -> Result<(T, u64), ApiError> {
        let params = drop_empty(params);
        let op = || async {
            let request = self.client.get(self.url(path)).query(&params);
            let response = self.execute(Method::GET, path, request).await?;
            let total = total_count(&response);
            let body = decode(response).await?;
            Ok::<_, ApiError>((body, total))
        };

        op.retry(self.retry.strategy())
            .when(ApiError::is_retryable)
            .notify(|err, dur| {
                warn!("Retrying GET {} after {:?}: {}", path, dur, err);
            })
            .await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Response, ApiError> {
        debug!(%method, path, "API request");

        let result = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => Err(error_from_response(response).await),
            Err(err) => Err(ApiError::from(err)),
        };

        result.inspect_err(|err| {
            warn!(%method, path, error = %err, "{}", err.user_message());
        })
    }
}

/// Build list query parameters: paging, filters, sort, then search
pub fn build_list_query(page: &PageRequest, filters: QueryParams) -> QueryParams {
    let mut params: QueryParams = vec![
        ("_page".to_string(), page.page.to_string()),
        ("_limit".to_string(), page.limit.to_string()),
    ];
    params.extend(filters);

    if let Some(sort) = page.sort.as_deref().filter(|s| !s.is_empty()) {
        params.push(("_sort".to_string(), sort.to_string()));
        params.push((
            "_order".to_string(),
            page.order.unwrap_or(SortOrder::Asc).to_string(),
        ));
    }

    if let Some(search) = page.search.as_deref() {
        params.push(("q".to_string(), search.to_string()));
    }

    drop_empty(params)
}

fn drop_empty(params: QueryParams) -> QueryParams {
    params.into_iter().filter(|(_, v)| !v.is_empty()).collect()
}

fn total_count(response: &Response) -> u64 {
    response
        .headers()
        .get(TOTAL_COUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(ApiError::from)?;
    // DELETE and some PATCH responses come back empty
    let bytes = if bytes.is_empty() { &b"null"[..] } else { &bytes[..] };
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));
    ApiError::http(status, message)
}
