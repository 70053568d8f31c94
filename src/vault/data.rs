//! Vault data plane client.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::interface::VaultData;
use crate::vault::auth::{ServicePrincipalCredential, TokenScope};
use crate::vault::client::{AzureClient, CORRELATION_HEADER};
use crate::vault::models::SecretList;
use crate::vault::VaultError;

pub const DATA_PLANE_API_VERSION: &str = "7.0";

pub struct KeyVaultDataClient {
    client: AzureClient,
}

impl KeyVaultDataClient {
    pub fn new(credential: Arc<ServicePrincipalCredential>) -> Result<Self, VaultError> {
        Ok(Self {
            client: AzureClient::new(credential, TokenScope::KeyVault)?,
        })
    }

    /// Tags every request with the given correlation id.
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.client
            .add_header(CORRELATION_HEADER, &correlation_id.to_string());
        self
    }
}

#[async_trait]
impl VaultData for KeyVaultDataClient {
    async fn list_secrets(&self, vault_uri: &str) -> Result<SecretList, VaultError> {
        let url = format!(
            "{}/secrets?api-version={}",
            vault_uri.trim_end_matches('/'),
            DATA_PLANE_API_VERSION
        );
        debug!("Listing secrets at {}", url);
        self.client.get(&url).await
    }
}
