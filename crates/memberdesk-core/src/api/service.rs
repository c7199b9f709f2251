use async_trait::async_trait;

use super::ApiError;
use crate::models::{Attachment, Customer, CustomerDraft, CustomerId};

/// How many records a list request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    /// The whole collection in one response
    #[default]
    All,
    Limit(u32),
}

impl PageSize {
    pub fn as_query_value(&self) -> String {
        match self {
            PageSize::All => "all".to_string(),
            PageSize::Limit(n) => n.to_string(),
        }
    }
}

/// The remote data service the customer cache is built on.
///
/// Implementations report failures with an `ApiError` whose `kind()` is
/// one of not found, validation or remote; the cache does not look any
/// deeper than that.
#[async_trait]
pub trait CustomerService: Send + Sync {
    async fn list(&self, page_size: PageSize) -> Result<Vec<Customer>, ApiError>;

    async fn get(&self, id: CustomerId) -> Result<Customer, ApiError>;

    async fn create(&self, draft: &CustomerDraft) -> Result<Customer, ApiError>;

    async fn update(&self, id: CustomerId, draft: &CustomerDraft) -> Result<Customer, ApiError>;

    async fn delete(&self, id: CustomerId) -> Result<(), ApiError>;

    async fn upload_attachment(&self, id: CustomerId, attachment: &Attachment) -> Result<(), ApiError>;

    async fn delete_attachment(&self, id: CustomerId) -> Result<(), ApiError>;
}
