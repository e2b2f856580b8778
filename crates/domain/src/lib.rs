//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod report;
mod session;

pub use report::{
    BirthDetails, Coordinates, GenerationErrorKind, GenerationFailure, GenerationOutcome,
    GenerationResult,
};
pub use session::{AuthChangeEvent, AuthChangeKind, AuthState, Session, User, UserId};
