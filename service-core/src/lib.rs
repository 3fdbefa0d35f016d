//! service-core: Shared infrastructure for the IAM credential rotation services.
pub mod config;
pub mod error;
pub mod observability;
