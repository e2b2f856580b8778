use async_trait::async_trait;
use serde_json::Value;
use stellara_core::AppResult;
use stellara_domain::BirthDetails;

/// Port for the remote report compute service.
#[async_trait]
pub trait ReportComputeService: Send + Sync {
    /// Submits birth details and returns the raw response payload.
    ///
    /// `Err` means the call could not be completed at the transport level. A
    /// returned payload may still carry an embedded `error` field.
    async fn generate_report(&self, details: &BirthDetails) -> AppResult<Value>;
}
