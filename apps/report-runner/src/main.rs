//! Stellara report runner.
//!
//! Wires the session manager and the generation orchestrator to the hosted
//! backend, submits one set of birth details and prints the outcome as JSON.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use stellara_application::{GenerationRequestOrchestrator, SessionManager};
use stellara_core::{AppError, AppResult, NonEmptyString};
use stellara_domain::{BirthDetails, GenerationOutcome, Session, User, UserId};
use stellara_infrastructure::{
    HttpReportComputeConfig, HttpReportComputeService, HttpRoleLookupConfig,
    HttpRoleLookupService, InMemoryIdentityProvider,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone)]
struct RunnerConfig {
    api_base_url: Url,
    api_key: NonEmptyString,
    report_function: String,
    admin_role: String,
    connect_timeout_ms: u64,
    seed_session: Option<Session>,
    birth_details: BirthDetails,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = RunnerConfig::load()?;
    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let role_lookup = HttpRoleLookupService::new(
        http_client.clone(),
        HttpRoleLookupConfig {
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.as_str().to_owned(),
            privileged_role: config.admin_role.clone(),
        },
    )?;
    let identity_provider = match config.seed_session.clone() {
        Some(session) => {
            info!(
                user_id = %session.user().id(),
                "seeding identity provider with configured session"
            );
            InMemoryIdentityProvider::with_session(session)
        }
        None => InMemoryIdentityProvider::new(),
    };
    let session_manager =
        SessionManager::start(Arc::new(identity_provider), Arc::new(role_lookup));
    let _auth_log = session_manager.subscribe(|state| {
        info!(
            signed_in = state.user.is_some(),
            loading = state.loading,
            is_admin = state.is_admin,
            "auth state changed"
        );
    });

    let compute_service = HttpReportComputeService::new(
        http_client,
        HttpReportComputeConfig {
            base_url: config.api_base_url.clone(),
            function_name: config.report_function.clone(),
            api_key: config.api_key.as_str().to_owned(),
        },
    )?;
    info!(
        endpoint = %compute_service.endpoint(),
        name = %config.birth_details.name,
        "stellara-report-runner started"
    );

    let orchestrator = GenerationRequestOrchestrator::new(Arc::new(compute_service));
    let outcome = orchestrator.generate(&config.birth_details).await;

    match &outcome {
        GenerationOutcome::Success { .. } => info!("report generation succeeded"),
        GenerationOutcome::Failure { failure } => warn!(
            kind = failure.kind.as_str(),
            message = %failure.message,
            "report generation failed"
        ),
    }

    let rendered = serde_json::to_string_pretty(&outcome)
        .map_err(|error| AppError::Internal(format!("failed to render outcome: {error}")))?;
    println!("{rendered}");

    session_manager.shutdown();
    Ok(())
}

impl RunnerConfig {
    fn load() -> AppResult<Self> {
        let api_base_url = required_env("STELLARA_API_BASE_URL")?;
        let api_base_url = Url::parse(api_base_url.as_str()).map_err(|error| {
            AppError::Validation(format!(
                "invalid STELLARA_API_BASE_URL value '{api_base_url}': {error}"
            ))
        })?;
        let api_key = NonEmptyString::new(required_env("STELLARA_API_KEY")?).map_err(|_| {
            AppError::Validation("STELLARA_API_KEY must not be empty".to_owned())
        })?;
        let report_function = optional_env("STELLARA_REPORT_FUNCTION")
            .unwrap_or_else(|| "generate-report".to_owned());
        let admin_role =
            optional_env("STELLARA_ADMIN_ROLE").unwrap_or_else(|| "admin".to_owned());
        let connect_timeout_ms = parse_env_u64("STELLARA_HTTP_CONNECT_TIMEOUT_MS", 5000)?;
        let seed_session = seed_session(
            optional_env("STELLARA_USER_ID"),
            optional_env("STELLARA_ACCESS_TOKEN"),
        )?;

        if connect_timeout_ms == 0 {
            return Err(AppError::Validation(
                "STELLARA_HTTP_CONNECT_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        let mut birth_details = BirthDetails::new(
            required_env("STELLARA_BIRTH_NAME")?,
            required_env("STELLARA_BIRTH_DATE")?,
            required_env("STELLARA_BIRTH_TIME")?,
            required_env("STELLARA_BIRTH_PLACE")?,
        );
        let latitude = parse_env_optional_f64("STELLARA_BIRTH_LATITUDE")?;
        let longitude = parse_env_optional_f64("STELLARA_BIRTH_LONGITUDE")?;
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => {
                birth_details = birth_details.with_coordinates(latitude, longitude);
            }
            (None, None) => {}
            _ => {
                return Err(AppError::Validation(
                    "STELLARA_BIRTH_LATITUDE and STELLARA_BIRTH_LONGITUDE must be set together"
                        .to_owned(),
                ));
            }
        }

        Ok(Self {
            api_base_url,
            api_key,
            report_function,
            admin_role,
            connect_timeout_ms,
            seed_session,
            birth_details,
        })
    }
}

fn seed_session(
    user_id: Option<String>,
    access_token: Option<String>,
) -> AppResult<Option<Session>> {
    match (user_id, access_token) {
        (Some(user_id), Some(access_token)) => {
            let user_id = user_id.parse::<UserId>()?;
            Ok(Some(Session::new(access_token, None, User::new(user_id, None))))
        }
        (None, None) => Ok(None),
        _ => Err(AppError::Validation(
            "STELLARA_USER_ID and STELLARA_ACCESS_TOKEN must be set together".to_owned(),
        )),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_optional_f64(name: &str) -> AppResult<Option<f64>> {
    match optional_env(name) {
        Some(value) => value.parse::<f64>().map(Some).map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use stellara_core::AppError;

    use super::seed_session;

    const USER_ID: &str = "00000000-0000-0000-0000-00000000002a";

    #[test]
    fn seed_session_is_built_from_user_id_and_token() {
        let session = seed_session(Some(USER_ID.to_owned()), Some("access".to_owned()))
            .unwrap_or_else(|_| unreachable!())
            .unwrap_or_else(|| unreachable!());

        assert_eq!(session.access_token(), "access");
        assert_eq!(session.user().id().to_string(), USER_ID);
    }

    #[test]
    fn seed_session_is_optional() {
        assert!(matches!(seed_session(None, None), Ok(None)));
    }

    #[test]
    fn seed_session_requires_both_values() {
        let result = seed_session(Some(USER_ID.to_owned()), None);

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn seed_session_rejects_malformed_user_id() {
        let result = seed_session(Some("not-a-uuid".to_owned()), Some("access".to_owned()));

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
