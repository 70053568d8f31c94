//! Network access rule management for a vault.
//!
//! A run performs these steps:
//! 1. Ensures the virtual network and the subnet named by the configured
//!    resource identifier exist, creating them if needed.
//! 2. Ensures the vault exists, creating it if needed.
//! 3. Adds a vnet rule for the subnet and an IP rule, updating the vault only
//!    if either rule was missing.
//! 4. Enables enforcement (default action `Deny`) and checks that listing
//!    secrets is now forbidden.
//! 5. Disables enforcement, removes both rules and checks that access is back.
//!
//! Only `NotFound` on existence checks and `Forbidden` on the two data probes
//! are expected; any other failure aborts the run.

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::interface::{NetworkManagement, VaultData, VaultManagement};
use crate::vault::acl;
use crate::vault::models::{
    NetworkRuleSet, Subnet, Vault, VaultCreateOrUpdateParameters, VaultProperties,
    VirtualNetwork, KEY_VAULT_SERVICE_ENDPOINT,
};
use crate::vault::resource_id::SubnetCoordinates;
use crate::vault::retry::{retry_http_request, RetryOutcome, RetryPolicy};
use crate::vault::VaultError;

pub const DEFAULT_VNET_ADDRESS_SPACE: &str = "10.1.0.0/16";
pub const DEFAULT_SUBNET_ADDRESS_PREFIX: &str = "10.1.0.0/24";

/// Statuses worth another attempt on any call.
const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Input of a network access run.
#[derive(Debug, Clone)]
pub struct NetworkAccessConfig {
    pub tenant_id: Uuid,
    pub vault_resource_group: String,
    pub vault_name: String,
    pub location: String,
    /// Identity granted secret permissions on a newly created vault.
    pub accessor_object_id: Option<String>,
    pub enable_soft_delete: bool,
    pub subnet: SubnetCoordinates,
    pub ip_address: String,
    pub vnet_address_space: String,
    pub subnet_address_prefix: String,
    pub initial_backoff_secs: u64,
    pub max_attempts: u32,
}

impl NetworkAccessConfig {
    /// Policy for reading back a vault that was just created. Any status other
    /// than NotFound or a transient one is returned unchanged.
    pub fn propagation_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.initial_backoff_secs, self.max_attempts)
            .retry_on([404])
            .retry_on(TRANSIENT_STATUSES)
            .abort_unclassified()
    }

    /// Policy for the data plane probes; `Forbidden` is an accepted outcome and
    /// any status other than a transient one is returned unchanged.
    pub fn probe_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.initial_backoff_secs, self.max_attempts)
            .continue_on([403])
            .retry_on(TRANSIENT_STATUSES)
            .abort_unclassified()
    }
}

/// Result of listing secrets on the data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Allowed,
    Forbidden,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub vnet_created: bool,
    pub subnet_created: bool,
    pub vault_created: bool,
    pub rules_updated: bool,
    pub enforcement_enabled: bool,
    pub enforced_probe: ProbeOutcome,
    pub restored_probe: ProbeOutcome,
    pub final_acl: Option<NetworkRuleSet>,
}

/// Drives one network access run against the given collaborators.
pub struct NetworkAccessRun<'a> {
    vaults: &'a dyn VaultManagement,
    networks: &'a dyn NetworkManagement,
    data: &'a dyn VaultData,
    config: &'a NetworkAccessConfig,
}

impl<'a> NetworkAccessRun<'a> {
    pub fn new(
        vaults: &'a dyn VaultManagement,
        networks: &'a dyn NetworkManagement,
        data: &'a dyn VaultData,
        config: &'a NetworkAccessConfig,
    ) -> Self {
        Self {
            vaults,
            networks,
            data,
            config,
        }
    }

    pub async fn run(&self) -> Result<RunReport, VaultError> {
        let config = self.config;
        let subnet = &config.subnet;
        info!(
            "Managing network access for vault '{}' in resource group '{}' using subnet '{}' of vnet '{}' (resource group '{}')",
            config.vault_name,
            config.vault_resource_group,
            subnet.subnet_name,
            subnet.vnet_name,
            subnet.resource_group
        );

        let (_vnet, vnet_created, subnet_created) = self.ensure_network().await?;
        let (mut vault, vault_created) = self.ensure_vault().await?;

        // Rules
        let acls = &mut vault.properties.network_acls;
        let vnet_rule_added = acl::ensure_vnet_rule(acls, &subnet.resource_id);
        let ip_rule_added = acl::ensure_ip_rule(acls, &config.ip_address);
        let rules_updated = vnet_rule_added || ip_rule_added;
        if rules_updated {
            info!(
                "Updating network access rules on vault '{}' in resource group '{}'",
                config.vault_name, config.vault_resource_group
            );
            vault = self.update_vault(&vault, "add network access rules").await?;
        } else {
            info!("Vault already has the requested rules; skipping update");
        }
        log_rules(&config.vault_name, vault.properties.network_acls.as_ref());

        let enforcement_enabled = acl::set_enforcement(&mut vault.properties.network_acls, true);
        if enforcement_enabled {
            info!(
                "Enabling network ACL enforcement on vault '{}'",
                config.vault_name
            );
            vault = self.update_vault(&vault, "enable enforcement").await?;
        }

        let vault_uri = vault_uri(&vault)?;
        info!("Accessing vault content with enforcement enabled; this should be denied unless the client matches a rule");
        let enforced_probe = self.probe(&vault_uri).await?;
        match enforced_probe {
            ProbeOutcome::Forbidden => info!("Access was denied as expected"),
            ProbeOutcome::Allowed => {
                warn!("Access was allowed; the client matches one of the vault's network rules")
            }
        }

        let cleared = acl::clear_rules(&mut vault.properties.network_acls);
        let disabled = acl::set_enforcement(&mut vault.properties.network_acls, false);
        if cleared || disabled {
            info!(
                "Disabling enforcement and removing network rules from vault '{}'",
                config.vault_name
            );
            vault = self.update_vault(&vault, "remove network access rules").await?;
        }

        info!("Accessing vault content with enforcement disabled; this should succeed");
        let restored_probe = self.probe(&vault_uri).await?;
        match restored_probe {
            ProbeOutcome::Allowed => info!("Verified access was restored"),
            ProbeOutcome::Forbidden => {
                warn!("Access is still denied; the ACL change may not have propagated yet")
            }
        }

        Ok(RunReport {
            vnet_created,
            subnet_created,
            vault_created,
            rules_updated,
            enforcement_enabled,
            enforced_probe,
            restored_probe,
            final_acl: vault.properties.network_acls,
        })
    }

    /// Returns the network plus whether the vnet and the subnet had to be created.
    async fn ensure_network(&self) -> Result<(VirtualNetwork, bool, bool), VaultError> {
        let config = self.config;
        let subnet = &config.subnet;
        let rg = subnet.resource_group.as_str();
        let vnet_name = subnet.vnet_name.as_str();

        info!(
            "Checking the existence of vnet '{}' in resource group '{}'",
            vnet_name, rg
        );
        let (mut vnet, vnet_created) = match self.networks.get_virtual_network(rg, vnet_name).await
        {
            Ok(vnet) => (vnet, false),
            Err(e) if e.is_not_found() => {
                info!("Vnet does not exist; creating '{}'", vnet_name);
                let params = VirtualNetwork::new(
                    &config.location,
                    &config.vnet_address_space,
                    self.subnet_parameters(),
                );
                self.networks
                    .create_or_update_virtual_network(rg, vnet_name, &params)
                    .await
                    .inspect_err(|e| error!("Unexpected error creating the virtual network: {}", e))?;
                let vnet = self
                    .networks
                    .get_virtual_network(rg, vnet_name)
                    .await
                    .inspect_err(|e| error!("Unexpected error retrieving the new vnet: {}", e))?;
                (vnet, true)
            }
            Err(e) => {
                error!("Unexpected error retrieving vnet '{}': {}", vnet_name, e);
                return Err(e);
            }
        };

        let subnet_created = match vnet.find_subnet(&subnet.subnet_name) {
            Some(existing) => {
                let has_endpoint = existing
                    .properties
                    .service_endpoints
                    .iter()
                    .any(|ep| ep.service.eq_ignore_ascii_case(KEY_VAULT_SERVICE_ENDPOINT));
                if !has_endpoint {
                    warn!(
                        "Subnet '{}' has no {} service endpoint; vnet rules will not apply to it",
                        existing.name, KEY_VAULT_SERVICE_ENDPOINT
                    );
                }
                false
            }
            None => {
                info!(
                    "Creating subnet '{}' in vnet '{}'",
                    subnet.subnet_name, vnet_name
                );
                self.networks
                    .create_or_update_subnet(
                        rg,
                        vnet_name,
                        &subnet.subnet_name,
                        &self.subnet_parameters(),
                    )
                    .await
                    .inspect_err(|e| error!("Unexpected error creating the subnet: {}", e))?;
                vnet = self
                    .networks
                    .get_virtual_network(rg, vnet_name)
                    .await
                    .inspect_err(|e| error!("Unexpected error retrieving the updated vnet: {}", e))?;
                true
            }
        };

        Ok((vnet, vnet_created, subnet_created))
    }

    /// Returns the vault and whether it had to be created.
    async fn ensure_vault(&self) -> Result<(Vault, bool), VaultError> {
        let config = self.config;
        let rg = config.vault_resource_group.as_str();
        let name = config.vault_name.as_str();

        info!("Checking the existence of vault '{}'", name);
        match self.vaults.get_vault(rg, name).await {
            Ok(vault) => return Ok((vault, false)),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                error!("Unexpected error retrieving vault '{}': {}", name, e);
                return Err(e);
            }
        }

        info!("Vault does not exist; creating '{}'", name);
        let params = VaultCreateOrUpdateParameters {
            location: config.location.clone(),
            properties: VaultProperties::new(
                config.tenant_id,
                config.accessor_object_id.as_deref(),
                config.enable_soft_delete,
            ),
        };
        self.vaults
            .create_or_update_vault(rg, name, &params)
            .await
            .inspect_err(|e| error!("Unexpected error creating the vault: {}", e))?;

        let policy = config.propagation_policy();
        let outcome = retry_http_request(
            || self.vaults.get_vault(rg, name),
            "retrieve the new vault",
            &policy,
        )
        .await
        .inspect_err(|e| error!("Unexpected error retrieving the new vault: {}", e))?;

        match outcome {
            RetryOutcome::Completed(vault) => Ok((vault, true)),
            RetryOutcome::Continued(status) => Err(VaultError::HttpStatus(
                status,
                format!("vault '{}' could not be retrieved after creation", name),
            )),
        }
    }

    async fn update_vault(&self, vault: &Vault, purpose: &str) -> Result<Vault, VaultError> {
        let params = VaultCreateOrUpdateParameters::from(vault);
        self.vaults
            .create_or_update_vault(
                &self.config.vault_resource_group,
                &self.config.vault_name,
                &params,
            )
            .await
            .inspect_err(|e| error!("Unexpected error updating the vault to {}: {}", purpose, e))
    }

    async fn probe(&self, vault_uri: &str) -> Result<ProbeOutcome, VaultError> {
        let policy = self.config.probe_policy();
        let outcome = retry_http_request(
            || self.data.list_secrets(vault_uri),
            "list secrets",
            &policy,
        )
        .await
        .inspect_err(|e| error!("Unexpected error accessing vault content: {}", e))?;

        Ok(match outcome {
            RetryOutcome::Completed(secrets) => {
                info!("Listed {} secrets", secrets.value.len());
                ProbeOutcome::Allowed
            }
            RetryOutcome::Continued(_) => ProbeOutcome::Forbidden,
        })
    }

    fn subnet_parameters(&self) -> Subnet {
        Subnet::with_vault_endpoint(
            &self.config.subnet.subnet_name,
            &self.config.subnet_address_prefix,
        )
    }
}

fn vault_uri(vault: &Vault) -> Result<String, VaultError> {
    vault
        .properties
        .vault_uri
        .clone()
        .ok_or_else(|| VaultError::ParseError("vault has no vaultUri".to_string()))
}

fn log_rules(vault_name: &str, acl: Option<&NetworkRuleSet>) {
    let Some(acl) = acl else {
        info!("Vault '{}' has no network rules", vault_name);
        return;
    };
    info!("Vnet access rules on vault '{}':", vault_name);
    for rule in &acl.virtual_network_rules {
        info!("\t* {}", rule.id);
    }
    info!("IP access rules on vault '{}':", vault_name);
    for rule in &acl.ip_rules {
        info!("\t* {}", rule.value);
    }
}
