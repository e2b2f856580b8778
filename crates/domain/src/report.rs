//! Report generation request and outcome types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Geographic coordinates of the birth place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// Birth details submitted for report generation.
///
/// Values are forwarded to the compute service as entered. Date, time and
/// place are not validated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthDetails {
    /// Name of the person the report is for.
    pub name: String,
    /// Date of birth as entered, e.g. `1990-01-01`.
    #[serde(rename = "dob")]
    pub date_of_birth: String,
    /// Time of birth as entered, e.g. `14:30`.
    #[serde(rename = "time")]
    pub time_of_birth: String,
    /// Birth place as entered.
    pub place: String,
    /// Resolved coordinates of the birth place, when known.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl BirthDetails {
    /// Creates birth details without coordinates.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        date_of_birth: impl Into<String>,
        time_of_birth: impl Into<String>,
        place: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            date_of_birth: date_of_birth.into(),
            time_of_birth: time_of_birth.into(),
            place: place.into(),
            coordinates: None,
        }
    }

    /// Attaches coordinates to the birth place.
    #[must_use]
    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates {
            latitude,
            longitude,
        });
        self
    }
}

/// Report data returned by the compute service, passed through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationResult(Value);

impl GenerationResult {
    /// Wraps a compute service payload.
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the wrapper and returns the raw payload.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Failure channel that produced a generation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    /// The call could not reach or complete at the remote service.
    Transport,
    /// The call completed but the payload carried an error.
    Application,
}

impl GenerationErrorKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Application => "application",
        }
    }
}

/// Typed generation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    /// Failure channel.
    pub kind: GenerationErrorKind,
    /// Message reported by that channel.
    pub message: String,
}

/// Result of one generation request: exactly one of success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// Report data produced by the compute service.
    Success {
        /// Report payload.
        result: GenerationResult,
    },
    /// The request failed on one of the two failure channels.
    Failure {
        /// Failure details.
        failure: GenerationFailure,
    },
}

impl GenerationOutcome {
    /// Builds a success outcome.
    #[must_use]
    pub fn success(result: GenerationResult) -> Self {
        Self::Success { result }
    }

    /// Builds a failure outcome.
    #[must_use]
    pub fn failure(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            failure: GenerationFailure {
                kind,
                message: message.into(),
            },
        }
    }

    /// Returns whether the outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the failure details, if any.
    #[must_use]
    pub fn failure_details(&self) -> Option<&GenerationFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { failure } => Some(failure),
        }
    }
}
