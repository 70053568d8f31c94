//! Resource manager client for virtual networks and subnets.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::interface::NetworkManagement;
use crate::vault::auth::{ServicePrincipalCredential, TokenScope};
use crate::vault::client::{AzureClient, CORRELATION_HEADER};
use crate::vault::models::{Subnet, VirtualNetwork};
use crate::vault::VaultError;

pub const NETWORK_API_VERSION: &str = "2020-05-01";

pub struct NetworkManagementClient {
    client: AzureClient,
    endpoint: String,
    subscription_id: String,
}

impl NetworkManagementClient {
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

    fn vnet_base(&self, resource_group: &str, vnet_name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworks/{}",
            self.endpoint, self.subscription_id, resource_group, vnet_name
        )
    }
}

#[async_trait]
impl NetworkManagement for NetworkManagementClient {
    async fn get_virtual_network(
        &self,
        resource_group: &str,
        vnet_name: &str,
    ) -> Result<VirtualNetwork, VaultError> {
        debug!("Retrieving vnet {}/{}", resource_group, vnet_name);
        let url = format!(
            "{}?api-version={}",
            self.vnet_base(resource_group, vnet_name),
            NETWORK_API_VERSION
        );
        self.client.get(&url).await
    }

    async fn create_or_update_virtual_network(
        &self,
        resource_group: &str,
        vnet_name: &str,
        vnet: &VirtualNetwork,
    ) -> Result<VirtualNetwork, VaultError> {
        debug!("Writing vnet {}/{}", resource_group, vnet_name);
        let url = format!(
            "{}?api-version={}",
            self.vnet_base(resource_group, vnet_name),
            NETWORK_API_VERSION
        );
        self.client.put(&url, vnet).await
    }

    async fn create_or_update_subnet(
        &self,
        resource_group: &str,
        vnet_name: &str,
        subnet_name: &str,
        subnet: &Subnet,
    ) -> Result<Subnet, VaultError> {
        debug!(
            "Writing subnet {} of vnet {}/{}",
            subnet_name, resource_group, vnet_name
        );
        let url = format!(
            "{}/subnets/{}?api-version={}",
            self.vnet_base(resource_group, vnet_name),
            subnet_name,
            NETWORK_API_VERSION
        );
        self.client.put(&url, subnet).await
    }
}
