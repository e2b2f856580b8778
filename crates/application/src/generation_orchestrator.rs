//! Report generation request orchestration.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use stellara_domain::{BirthDetails, GenerationErrorKind, GenerationOutcome, GenerationResult};
use tracing::{info, warn};

use crate::ReportComputeService;

const UNSPECIFIED_APPLICATION_ERROR: &str = "report service returned an unspecified error";

/// Turns birth details into exactly one [`GenerationOutcome`].
///
/// Each call issues one request. Calls are not deduplicated, cached or
/// retried.
#[derive(Clone)]
pub struct GenerationRequestOrchestrator {
    compute_service: Arc<dyn ReportComputeService>,
    in_flight: Arc<AtomicUsize>,
}

impl GenerationRequestOrchestrator {
    /// Creates a new orchestrator.
    #[must_use]
    pub fn new(compute_service: Arc<dyn ReportComputeService>) -> Self {
        Self {
            compute_service,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns how many requests are awaiting the compute service.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Submits birth details to the compute service.
    ///
    /// Transport failures are checked first, then an `error` field embedded in
    /// an otherwise successful payload. Only a payload that passes both checks
    /// is returned as a success.
    pub async fn generate(&self, details: &BirthDetails) -> GenerationOutcome {
        let payload = {
            let _in_flight = InFlightGuard::enter(&self.in_flight);
            self.compute_service.generate_report(details).await
        };

        let payload = match payload {
            Ok(payload) => payload,
            Err(error) => {
                warn!(error = %error, "report generation failed at transport level");
                return GenerationOutcome::failure(GenerationErrorKind::Transport, error.message());
            }
        };

        if let Some(message) = embedded_error_message(&payload) {
            warn!(error = %message, "report service returned an application error");
            return GenerationOutcome::failure(GenerationErrorKind::Application, message);
        }

        info!("report generated");
        GenerationOutcome::success(GenerationResult::new(payload))
    }
}

struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Extracts the embedded error of a transport-successful payload.
///
/// An absent, `null` or `false` error field means no error.
fn embedded_error_message(payload: &Value) -> Option<String> {
    let error = payload.as_object()?.get("error")?;
    let message = match error {
        Value::Null | Value::Bool(false) => return None,
        Value::Bool(true) => String::new(),
        Value::String(message) => message.clone(),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_owned),
        other => other.to_string(),
    };

    if message.trim().is_empty() {
        return Some(UNSPECIFIED_APPLICATION_ERROR.to_owned());
    }

    Some(message)
}

#[cfg(test)]
mod tests;
