//! Vault module for the keyvault-vnet library
//!
//! This module implements the core functionality for managing network access
//! to an Azure Key Vault.
//!
//! ## Architectural role:
//! - `resource_id` and `acl` hold the pure logic: identifier parsing and
//!   idempotent rule edits
//! - `reconcile` drives a full run through the collaborator traits in
//!   [`crate::interface`]
//! - `client`, `auth`, `management`, `network` and `data` are the HTTP
//!   implementations of those collaborators
//!
//! ## Testing strategy:
//! - Each module contains its own unit tests within a `#[cfg(test)] mod tests` block
//! - HTTP clients are exercised against `wiremock` servers in `tests/`
//! - The workflow is exercised against in-memory collaborators in `tests/`

pub mod acl;
pub mod auth;
pub mod client;
pub mod data;
pub mod error;
pub mod management;
pub mod models;
pub mod network;
pub mod reconcile;
pub mod resource_id;
pub mod retry;

// Re-export key types for convenience
pub use auth::{ServicePrincipalCredential, TokenScope};
pub use client::AzureClient;
pub use data::KeyVaultDataClient;
pub use error::VaultError;
pub use management::KeyVaultManagementClient;
pub use models::{Bypass, DefaultAction, NetworkRuleSet, Vault};
pub use network::NetworkManagementClient;
pub use reconcile::{NetworkAccessConfig, NetworkAccessRun, ProbeOutcome, RunReport};
pub use resource_id::{subnet_coordinates, ResourceIdentifier, SubnetCoordinates};
pub use retry::{retry_http_request, RetryOutcome, RetryPolicy};
