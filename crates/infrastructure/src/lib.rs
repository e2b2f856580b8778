//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_report_compute_service;
mod http_role_lookup_service;
mod in_memory_identity_provider;
mod static_role_lookup_service;

pub use http_report_compute_service::{HttpReportComputeConfig, HttpReportComputeService};
pub use http_role_lookup_service::{HttpRoleLookupConfig, HttpRoleLookupService};
pub use in_memory_identity_provider::InMemoryIdentityProvider;
pub use static_role_lookup_service::StaticRoleLookupService;
