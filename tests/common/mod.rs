//! In-memory collaborators for workflow tests.
//!
//! `FakeAzure` implements the management and data plane traits over a small
//! in-memory state and records every call so tests can assert on the exact
//! sequence of remote operations.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use keyvault_vnet::interface::{NetworkManagement, VaultData, VaultManagement};
use keyvault_vnet::vault::models::{
    DefaultAction, SecretList, Subnet, Vault, VaultCreateOrUpdateParameters, VaultProperties,
    VirtualNetwork,
};
use keyvault_vnet::vault::{subnet_coordinates, NetworkAccessConfig, VaultError};
use uuid::Uuid;

pub const SUBNET_ID: &str = "/subscriptions/33f39d49-6173-49bf-9789-db5548ee6d73/resourceGroups/net-rg/providers/Microsoft.Network/virtualNetworks/sample-vnet/subnets/subnet-0";
pub const VAULT_RG: &str = "vault-rg";
pub const VAULT_NAME: &str = "keyvaultsample";
pub const IP_ADDRESS: &str = "203.0.113.10";

pub fn setup_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn network_config() -> NetworkAccessConfig {
    NetworkAccessConfig {
        tenant_id: Uuid::new_v4(),
        vault_resource_group: VAULT_RG.to_string(),
        vault_name: VAULT_NAME.to_string(),
        location: "southcentralus".to_string(),
        accessor_object_id: Some(Uuid::new_v4().to_string()),
        enable_soft_delete: false,
        subnet: subnet_coordinates(SUBNET_ID).expect("valid subnet id"),
        ip_address: IP_ADDRESS.to_string(),
        vnet_address_space: "10.1.0.0/16".to_string(),
        subnet_address_prefix: "10.1.0.0/24".to_string(),
        initial_backoff_secs: 1,
        max_attempts: 4,
    }
}

#[derive(Default)]
struct State {
    vaults: HashMap<String, Vault>,
    vnets: HashMap<String, VirtualNetwork>,
    calls: Vec<String>,
    /// Call name to (first failing invocation, status), counted from 1.
    failures: HashMap<String, (usize, u16)>,
    /// Number of `get_vault` calls answered with NotFound after a vault is created.
    hidden_reads_after_create: u32,
    pending_hidden_reads: u32,
    /// Whether the data plane honours `DefaultAction::Deny`.
    deny_when_enforced: bool,
}

impl State {
    /// Records `call` and returns the injected failure for this invocation, if any.
    fn record(&mut self, call: &str) -> Result<(), VaultError> {
        self.calls.push(call.to_string());
        let invocation = self.calls.iter().filter(|c| c.as_str() == call).count();
        match self.failures.get(call) {
            Some(&(from, status)) if invocation >= from => {
                let body = format!("injected {} failure", call);
                Err(match status {
                    404 => VaultError::NotFound(body),
                    403 => VaultError::Forbidden(body),
                    other => VaultError::HttpStatus(other, body),
                })
            }
            _ => Ok(()),
        }
    }
}

pub struct FakeAzure {
    state: Mutex<State>,
}

impl Default for FakeAzure {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAzure {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                deny_when_enforced: true,
                ..Default::default()
            }),
        }
    }

    pub fn with_vault(self, vault: Vault) -> Self {
        self.state
            .lock()
            .unwrap()
            .vaults
            .insert(key(VAULT_RG, VAULT_NAME), vault);
        self
    }

    pub fn with_vnet(self, vnet: VirtualNetwork) -> Self {
        let coords = subnet_coordinates(SUBNET_ID).unwrap();
        self.state
            .lock()
            .unwrap()
            .vnets
            .insert(key(&coords.resource_group, &coords.vnet_name), vnet);
        self
    }

    pub fn failing_vault_reads(self, status: u16) -> Self {
        self.failing_from("get_vault", 1, status)
    }

    /// Makes `call` fail with `status` from its `invocation`-th use onwards.
    pub fn failing_from(self, call: &str, invocation: usize, status: u16) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(call.to_string(), (invocation, status));
        self
    }

    pub fn hiding_new_vaults_for(self, reads: u32) -> Self {
        self.state.lock().unwrap().hidden_reads_after_create = reads;
        self
    }

    pub fn allowing_enforced_access(self) -> Self {
        self.state.lock().unwrap().deny_when_enforced = false;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn stored_vnet(&self) -> Option<VirtualNetwork> {
        let coords = subnet_coordinates(SUBNET_ID).unwrap();
        self.state
            .lock()
            .unwrap()
            .vnets
            .get(&key(&coords.resource_group, &coords.vnet_name))
            .cloned()
    }

    pub fn stored_vault(&self) -> Option<Vault> {
        self.state
            .lock()
            .unwrap()
            .vaults
            .get(&key(VAULT_RG, VAULT_NAME))
            .cloned()
    }
}

/// A vault as the management plane would return it.
pub fn existing_vault() -> Vault {
    let params = VaultCreateOrUpdateParameters {
        location: "southcentralus".to_string(),
        properties: VaultProperties::new(Uuid::new_v4(), None, false),
    };
    materialize(VAULT_NAME, &params)
}

fn materialize(name: &str, params: &VaultCreateOrUpdateParameters) -> Vault {
    let mut properties = params.properties.clone();
    if properties.vault_uri.is_none() {
        properties.vault_uri = Some(format!("https://{}.vault.azure.net/", name));
    }
    Vault {
        id: Some(format!(
            "/subscriptions/s/resourceGroups/{}/providers/Microsoft.KeyVault/vaults/{}",
            VAULT_RG, name
        )),
        name: Some(name.to_string()),
        location: params.location.clone(),
        properties,
    }
}

fn key(resource_group: &str, name: &str) -> String {
    format!("{}/{}", resource_group, name).to_lowercase()
}

#[async_trait]
impl VaultManagement for FakeAzure {
    async fn get_vault(&self, resource_group: &str, vault_name: &str) -> Result<Vault, VaultError> {
        let mut state = self.state.lock().unwrap();
        state.record("get_vault")?;
        if state.pending_hidden_reads > 0 {
            state.pending_hidden_reads -= 1;
            return Err(VaultError::NotFound("not yet visible".to_string()));
        }
        state
            .vaults
            .get(&key(resource_group, vault_name))
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("vault {}", vault_name)))
    }

    async fn create_or_update_vault(
        &self,
        resource_group: &str,
        vault_name: &str,
        parameters: &VaultCreateOrUpdateParameters,
    ) -> Result<Vault, VaultError> {
        let mut state = self.state.lock().unwrap();
        state.record("put_vault")?;
        let vault_key = key(resource_group, vault_name);
        if !state.vaults.contains_key(&vault_key) {
            state.pending_hidden_reads = state.hidden_reads_after_create;
        }
        let vault = materialize(vault_name, parameters);
        state.vaults.insert(vault_key, vault.clone());
        Ok(vault)
    }
}

#[async_trait]
impl NetworkManagement for FakeAzure {
    async fn get_virtual_network(
        &self,
        resource_group: &str,
        vnet_name: &str,
    ) -> Result<VirtualNetwork, VaultError> {
        let mut state = self.state.lock().unwrap();
        state.record("get_vnet")?;
        state
            .vnets
            .get(&key(resource_group, vnet_name))
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("vnet {}", vnet_name)))
    }

    async fn create_or_update_virtual_network(
        &self,
        resource_group: &str,
        vnet_name: &str,
        vnet: &VirtualNetwork,
    ) -> Result<VirtualNetwork, VaultError> {
        let mut state = self.state.lock().unwrap();
        state.record("put_vnet")?;
        let mut stored = vnet.clone();
        stored.name = Some(vnet_name.to_string());
        state
            .vnets
            .insert(key(resource_group, vnet_name), stored.clone());
        Ok(stored)
    }

    async fn create_or_update_subnet(
        &self,
        resource_group: &str,
        vnet_name: &str,
        subnet_name: &str,
        subnet: &Subnet,
    ) -> Result<Subnet, VaultError> {
        let mut state = self.state.lock().unwrap();
        state.record("put_subnet")?;
        let vnet = state
            .vnets
            .get_mut(&key(resource_group, vnet_name))
            .ok_or_else(|| VaultError::NotFound(format!("vnet {}", vnet_name)))?;
        let mut stored = subnet.clone();
        stored.name = subnet_name.to_string();
        vnet.properties
            .subnets
            .retain(|s| !s.name.eq_ignore_ascii_case(subnet_name));
        vnet.properties.subnets.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl VaultData for FakeAzure {
    async fn list_secrets(&self, vault_uri: &str) -> Result<SecretList, VaultError> {
        let mut state = self.state.lock().unwrap();
        state.record("list_secrets")?;
        let vault = state
            .vaults
            .values()
            .find(|v| v.properties.vault_uri.as_deref() == Some(vault_uri))
            .ok_or_else(|| VaultError::NotFound(format!("no vault at {}", vault_uri)))?;

        let enforced = vault
            .properties
            .network_acls
            .as_ref()
            .is_some_and(|acl| acl.default_action == DefaultAction::Deny);
        if enforced && state.deny_when_enforced {
            return Err(VaultError::Forbidden(
                "Client address is not authorized".to_string(),
            ));
        }
        Ok(SecretList::default())
    }
}
