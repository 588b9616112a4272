//! service-core: Shared infrastructure for billing services.
pub mod config;
pub mod error;
pub mod observability;
