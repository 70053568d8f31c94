//! Collaborator contracts consumed by the network access workflow.
//!
//! The HTTP implementations live in the `vault` module; tests substitute
//! in-memory ones.

use async_trait::async_trait;

use crate::vault::models::{
    SecretList, Subnet, Vault, VaultCreateOrUpdateParameters, VirtualNetwork,
};
use crate::vault::VaultError;

/// Management plane operations on vaults.
#[async_trait]
pub trait VaultManagement: Send + Sync {
    /// Fails with [`VaultError::NotFound`] when the vault does not exist.
    async fn get_vault(&self, resource_group: &str, vault_name: &str)
        -> Result<Vault, VaultError>;

    async fn create_or_update_vault(
        &self,
        resource_group: &str,
        vault_name: &str,
        parameters: &VaultCreateOrUpdateParameters,
    ) -> Result<Vault, VaultError>;
}

/// Management plane operations on virtual networks and subnets.
#[async_trait]
pub trait NetworkManagement: Send + Sync {
    /// Fails with [`VaultError::NotFound`] when the network does not exist.
    async fn get_virtual_network(
        &self,
        resource_group: &str,
        vnet_name: &str,
    ) -> Result<VirtualNetwork, VaultError>;

    async fn create_or_update_virtual_network(
        &self,
        resource_group: &str,
        vnet_name: &str,
        vnet: &VirtualNetwork,
    ) -> Result<VirtualNetwork, VaultError>;

    async fn create_or_update_subnet(
        &self,
        resource_group: &str,
        vnet_name: &str,
        subnet_name: &str,
        subnet: &Subnet,
    ) -> Result<Subnet, VaultError>;
}

/// Data plane operations on a vault's content.
#[async_trait]
pub trait VaultData: Send + Sync {
    /// Fails with [`VaultError::Forbidden`] when the caller is denied access.
    async fn list_secrets(&self, vault_uri: &str) -> Result<SecretList, VaultError>;
}
