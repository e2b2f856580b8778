//! Application services and ports.

#![forbid(unsafe_code)]

mod generation_orchestrator;
mod report_ports;
mod session_manager;
mod session_ports;

pub use generation_orchestrator::GenerationRequestOrchestrator;
pub use report_ports::ReportComputeService;
pub use session_manager::{AuthStateListener, AuthStateSubscription, SessionManager};
pub use session_ports::{
    AuthChangeListener, AuthChangeSubscription, IdentityProvider, RoleLookupService,
};
