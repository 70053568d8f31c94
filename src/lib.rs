//! keyvault-vnet - Key Vault network access rule management
//!
//! This crate demonstrates virtual-network based access rules on an Azure Key
//! Vault. It resolves a subnet resource identifier, makes sure the network and
//! the vault exist, adds vnet and IP rules to the vault's network ACL, and
//! verifies through the data plane that enforcement denies and later restores
//! access.
//!
//! ## Architecture
//!
//! - `cli` module - Command-line interface (builds a run from configuration)
//! - `config` module - Validated sample configuration
//! - `interface` module - Collaborator traits the workflow depends on
//! - `vault` module - Identifier parsing, ACL logic, workflow and HTTP clients
//!
//! The workflow only talks to the collaborator traits, so the HTTP clients can
//! be swapped for in-memory ones in tests.

pub mod cli;
pub mod config;
pub mod interface;
pub mod vault;

pub use config::SampleConfig;
pub use vault::{NetworkAccessRun, ResourceIdentifier, RunReport, VaultError};

/// Initialize logging for tests
#[allow(dead_code)]
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer() // This ensures output goes to both stdout and test output
        .try_init();
}
