use crate::domain::model::{HttpRequest, HttpResponse};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Sends one fully-resolved request. Non-2xx statuses are returned, not raised;
/// mapping them to errors is the client's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}
