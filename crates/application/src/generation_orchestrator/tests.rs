use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use stellara_core::{AppError, AppResult};
use stellara_domain::{BirthDetails, GenerationErrorKind, GenerationOutcome, GenerationResult};
use tokio::sync::{Mutex, oneshot};

use crate::ReportComputeService;

use super::{GenerationRequestOrchestrator, embedded_error_message};

struct FakeComputeService {
    response: AppResult<Value>,
}

#[async_trait]
impl ReportComputeService for FakeComputeService {
    async fn generate_report(&self, _details: &BirthDetails) -> AppResult<Value> {
        self.response.clone()
    }
}

#[derive(Default)]
struct GatedComputeService {
    gates: Mutex<HashMap<String, oneshot::Receiver<AppResult<Value>>>>,
}

impl GatedComputeService {
    async fn gate(&self, name: &str) -> oneshot::Sender<AppResult<Value>> {
        let (sender, receiver) = oneshot::channel();
        self.gates.lock().await.insert(name.to_owned(), receiver);
        sender
    }
}

#[async_trait]
impl ReportComputeService for GatedComputeService {
    async fn generate_report(&self, details: &BirthDetails) -> AppResult<Value> {
        let gate = self.gates.lock().await.remove(details.name.as_str());
        match gate {
            Some(gate) => gate
                .await
                .unwrap_or_else(|_| Err(AppError::Unavailable("gate dropped".to_owned()))),
            None => Err(AppError::NotFound(format!("no gate for '{}'", details.name))),
        }
    }
}

fn asha() -> BirthDetails {
    BirthDetails::new("Asha", "1990-01-01", "14:30", "Pune")
}

fn orchestrator_returning(response: AppResult<Value>) -> GenerationRequestOrchestrator {
    GenerationRequestOrchestrator::new(Arc::new(FakeComputeService { response }))
}

#[tokio::test]
async fn transport_error_maps_to_transport_failure() {
    let orchestrator = orchestrator_returning(Err(AppError::Unavailable(
        "report service returned status 502".to_owned(),
    )));

    let outcome = orchestrator.generate(&asha()).await;

    assert_eq!(
        outcome,
        GenerationOutcome::failure(
            GenerationErrorKind::Transport,
            "report service returned status 502"
        )
    );
}

#[tokio::test]
async fn embedded_error_maps_to_application_failure() {
    let orchestrator = orchestrator_returning(Ok(json!({"error": "invalid date"})));

    let outcome = orchestrator.generate(&asha()).await;

    assert_eq!(
        outcome,
        GenerationOutcome::failure(GenerationErrorKind::Application, "invalid date")
    );
}

#[tokio::test]
async fn well_formed_payload_passes_through_unmodified() {
    let payload = json!({
        "planets": [{"name": "Sun", "sign": "Capricorn", "degree": 16.7}],
        "ascendant": "Leo",
        "error": null,
    });
    let orchestrator = orchestrator_returning(Ok(payload.clone()));

    let outcome = orchestrator.generate(&asha()).await;

    assert_eq!(outcome, GenerationOutcome::success(GenerationResult::new(payload)));
}

#[tokio::test]
async fn empty_payload_without_error_is_a_success() {
    let orchestrator = orchestrator_returning(Ok(json!({})));

    let outcome = orchestrator.generate(&asha()).await;

    assert!(outcome.is_success());
}

#[tokio::test]
async fn concurrent_generations_resolve_independently() {
    let compute_service = Arc::new(GatedComputeService::default());
    let asha_gate = compute_service.gate("Asha").await;
    let ravi_gate = compute_service.gate("Ravi").await;
    let orchestrator = GenerationRequestOrchestrator::new(compute_service);
    let asha = asha();
    let ravi = BirthDetails::new("Ravi", "1985-07-12", "06:05", "Chennai");

    let release = async {
        tokio::task::yield_now().await;
        assert_eq!(orchestrator.in_flight(), 2);
        assert!(ravi_gate.send(Ok(json!({"error": "unknown place"}))).is_ok());
        tokio::task::yield_now().await;
        assert!(asha_gate.send(Ok(json!({"ascendant": "Leo"}))).is_ok());
    };

    let (asha_outcome, ravi_outcome, ()) = tokio::join!(
        orchestrator.generate(&asha),
        orchestrator.generate(&ravi),
        release
    );

    assert_eq!(
        asha_outcome,
        GenerationOutcome::success(GenerationResult::new(json!({"ascendant": "Leo"})))
    );
    assert_eq!(
        ravi_outcome,
        GenerationOutcome::failure(GenerationErrorKind::Application, "unknown place")
    );
    assert_eq!(orchestrator.in_flight(), 0);
}

#[test]
fn embedded_error_variants_are_normalized() {
    assert_eq!(embedded_error_message(&json!({"ascendant": "Leo"})), None);
    assert_eq!(embedded_error_message(&json!({"error": false})), None);
    assert_eq!(embedded_error_message(&json!(["not", "an", "object"])), None);
    assert_eq!(
        embedded_error_message(&json!({"error": {"message": "ephemeris unavailable"}})),
        Some("ephemeris unavailable".to_owned())
    );
    assert_eq!(
        embedded_error_message(&json!({"error": "  "})),
        Some("report service returned an unspecified error".to_owned())
    );
    assert_eq!(
        embedded_error_message(&json!({"error": 42})),
        Some("42".to_owned())
    );
}
