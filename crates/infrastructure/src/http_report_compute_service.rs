use async_trait::async_trait;
use serde_json::Value;
use stellara_application::ReportComputeService;
use stellara_core::{AppError, AppResult};
use stellara_domain::BirthDetails;
use tracing::debug;
use url::Url;

/// Connection settings for the report compute function.
#[derive(Debug, Clone)]
pub struct HttpReportComputeConfig {
    /// Base URL of the hosted backend, e.g. `https://project.example.co`.
    pub base_url: Url,
    /// Name of the compute function under `/functions/v1/`.
    pub function_name: String,
    /// Publishable API key sent with every request.
    pub api_key: String,
}

/// HTTP adapter for the remote report compute service.
///
/// Any failure to complete the exchange, including a non-2xx status or an
/// undecodable body, is reported as [`AppError::Unavailable`]. A decoded body
/// is returned as-is, embedded errors included.
pub struct HttpReportComputeService {
    http_client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl HttpReportComputeService {
    /// Creates a compute service adapter.
    pub fn new(http_client: reqwest::Client, config: HttpReportComputeConfig) -> AppResult<Self> {
        let function_name = config.function_name.trim().trim_matches('/');
        if function_name.is_empty() {
            return Err(AppError::Validation(
                "report function name must not be empty".to_owned(),
            ));
        }

        let endpoint = format!(
            "{}/functions/v1/{function_name}",
            config.base_url.as_str().trim_end_matches('/')
        );
        let endpoint = Url::parse(endpoint.as_str()).map_err(|error| {
            AppError::Validation(format!("invalid report endpoint '{endpoint}': {error}"))
        })?;

        Ok(Self {
            http_client,
            endpoint,
            api_key: config.api_key,
        })
    }

    /// Returns the resolved function endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ReportComputeService for HttpReportComputeService {
    async fn generate_report(&self, details: &BirthDetails) -> AppResult<Value> {
        debug!(endpoint = %self.endpoint, "calling report compute function");

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .header("apikey", self.api_key.as_str())
            .bearer_auth(self.api_key.as_str())
            .json(details)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to call report service: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Unavailable(format!(
                "report service returned status {}: {body}",
                status.as_u16()
            )));
        }

        response.json::<Value>().await.map_err(|error| {
            AppError::Unavailable(format!(
                "failed to parse report service response body: {error}"
            ))
        })
    }
}
