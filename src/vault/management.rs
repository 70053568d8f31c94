//! Resource manager client for key vaults.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::interface::VaultManagement;
use crate::vault::auth::{ServicePrincipalCredential, TokenScope};
use crate::vault::client::{AzureClient, CORRELATION_HEADER};
use crate::vault::models::{Vault, VaultCreateOrUpdateParameters};
use crate::vault::VaultError;

pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
pub const KEY_VAULT_API_VERSION: &str = "2019-09-01";

pub struct KeyVaultManagementClient {
    client: AzureClient,
    endpoint: String,
    subscription_id: String,
}

impl KeyVaultManagementClient {
    pub fn new(
        credential: Arc<ServicePrincipalCredential>,
        endpoint: &str,
        subscription_id: &str,
    ) -> Result<Self, VaultError> {
        Ok(Self {
            client: AzureClient::new(credential, TokenScope::Management)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.to_string(),
        })
    }

    /// Tags every request with the given correlation id.
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.client
            .add_header(CORRELATION_HEADER, &correlation_id.to_string());
        self
    }

    fn vault_url(&self, resource_group: &str, vault_name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.KeyVault/vaults/{}?api-version={}",
            self.endpoint, self.subscription_id, resource_group, vault_name, KEY_VAULT_API_VERSION
        )
    }
}

#[async_trait]
impl VaultManagement for KeyVaultManagementClient {
    async fn get_vault(&self, resource_group: &str, vault_name: &str) -> Result<Vault, VaultError> {
        debug!("Retrieving vault {}/{}", resource_group, vault_name);
        self.client
            .get(&self.vault_url(resource_group, vault_name))
            .await
    }

    async fn create_or_update_vault(
        &self,
        resource_group: &str,
        vault_name: &str,
        parameters: &VaultCreateOrUpdateParameters,
    ) -> Result<Vault, VaultError> {
        debug!("Writing vault {}/{}", resource_group, vault_name);
        self.client
            .put(&self.vault_url(resource_group, vault_name), parameters)
            .await
    }
}
