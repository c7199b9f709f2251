//! REST client for the membership service.
//!
//! `ApiClient` implements `CustomerService` over HTTP, with bearer token
//! authentication and backoff on rate limiting.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{header, multipart, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use super::{ApiError, CustomerService, PageSize};
use crate::models::{Attachment, Customer, CustomerDraft, CustomerId};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Multipart field name the service expects for profile images
const IMAGE_FIELD: &str = "image";

/// List endpoints answer either with a bare array or a wrapped page.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<Customer>),
    Wrapped {
        #[serde(alias = "data", alias = "items", alias = "customers")]
        results: Vec<Customer>,
    },
}

impl ListResponse {
    fn into_customers(self) -> Vec<Customer> {
        match self {
            ListResponse::Bare(customers) => customers,
            ListResponse::Wrapped { results } => results,
        }
    }
}

/// API client for the membership service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client against `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
            initial_backoff: self.initial_backoff,
        }
    }

    /// Override the first rate-limit backoff delay (doubles on each retry)
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn customer_url(&self, id: CustomerId) -> String {
        self.url(&format!("/customers/{}", id))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidResponse(format!("Invalid token header: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    /// `build` is called once per attempt since request bodies are consumed.
    async fn send(
        &self,
        label: &str,
        build: impl Fn() -> Result<RequestBuilder, ApiError>,
    ) -> Result<Response, ApiError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            debug!(request = label, attempt = retries + 1, "Sending request");
            let response = build()?.headers(self.auth_headers()?).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    let jitter_ms = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 4);
                    let delay = backoff + Duration::from_millis(jitter_ms);
                    warn!(request = label, retry = retries, delay_ms = delay.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(delay).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn parse<T: DeserializeOwned>(label: &str, response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", label, e)))
    }

    fn image_form(attachment: &Attachment) -> Result<multipart::Form, ApiError> {
        let part = multipart::Part::bytes(attachment.bytes.clone())
            .file_name(attachment.file_name.clone())
            .mime_str(&attachment.content_type)?;
        Ok(multipart::Form::new().part(IMAGE_FIELD, part))
    }
}

#[async_trait]
impl CustomerService for ApiClient {
    async fn list(&self, page_size: PageSize) -> Result<Vec<Customer>, ApiError> {
        let url = self.url("/customers");
        let page = page_size.as_query_value();
        let response = self
            .send("list customers", || {
                Ok(self.client.get(&url).query(&[("page_size", page.as_str())]))
            })
            .await?;
        let list: ListResponse = Self::parse("customer list", response).await?;
        let customers = list.into_customers();
        debug!(count = customers.len(), "Fetched customer list");
        Ok(customers)
    }

    async fn get(&self, id: CustomerId) -> Result<Customer, ApiError> {
        let url = self.customer_url(id);
        let response = self.send("get customer", || Ok(self.client.get(&url))).await?;
        Self::parse("customer", response).await
    }

    async fn create(&self, draft: &CustomerDraft) -> Result<Customer, ApiError> {
        let url = self.url("/customers");
        let response = self
            .send("create customer", || Ok(self.client.post(&url).json(draft)))
            .await?;
        Self::parse("created customer", response).await
    }

    async fn update(&self, id: CustomerId, draft: &CustomerDraft) -> Result<Customer, ApiError> {
        let url = self.customer_url(id);
        let response = self
            .send("update customer", || Ok(self.client.put(&url).json(draft)))
            .await?;
        Self::parse("updated customer", response).await
    }

    async fn delete(&self, id: CustomerId) -> Result<(), ApiError> {
        let url = self.customer_url(id);
        self.send("delete customer", || Ok(self.client.delete(&url))).await?;
        Ok(())
    }

    async fn upload_attachment(&self, id: CustomerId, attachment: &Attachment) -> Result<(), ApiError> {
        let url = self.url(&format!("/customers/{}/image", id));
        self.send("upload image", || {
            Ok(self.client.post(&url).multipart(Self::image_form(attachment)?))
        })
        .await?;
        debug!(customer_id = %id, bytes = attachment.len(), "Uploaded image");
        Ok(())
    }

    async fn delete_attachment(&self, id: CustomerId) -> Result<(), ApiError> {
        let url = self.url(&format!("/customers/{}/image", id));
        self.send("delete image", || Ok(self.client.delete(&url))).await?;
        Ok(())
    }
}
