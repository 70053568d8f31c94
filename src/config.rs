//! Sample configuration.
//!
//! Raw values come from the command line or the environment (see [`crate::cli`]);
//! [`SampleConfig::build`] validates them and derives the network coordinates
//! from the subnet resource identifier.

use std::net::IpAddr;

use uuid::Uuid;

use crate::vault::auth::DEFAULT_AUTHORITY_HOST;
use crate::vault::management::DEFAULT_MANAGEMENT_ENDPOINT;
use crate::vault::reconcile::{DEFAULT_SUBNET_ADDRESS_PREFIX, DEFAULT_VNET_ADDRESS_SPACE};
use crate::vault::{subnet_coordinates, NetworkAccessConfig, VaultError};

pub const DEFAULT_LOCATION: &str = "southcentralus";
pub const DEFAULT_VAULT_NAME: &str = "keyvaultsample";
pub const DEFAULT_IP_ADDRESS: &str = "203.0.113.10";
pub const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 5;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Unvalidated identity and endpoint values.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
    pub authority_host: Option<String>,
    pub management_endpoint: Option<String>,
}

/// Unvalidated values of a full sample run.
#[derive(Debug, Clone, Default)]
pub struct SampleSettings {
    pub client: ClientSettings,
    pub resource_group: String,
    pub location: Option<String>,
    pub vault_name: Option<String>,
    pub subnet_resource_id: String,
    pub accessor_object_id: Option<String>,
    pub ip_address: Option<String>,
    pub enable_soft_delete: bool,
    pub initial_backoff_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Validated identity of the application and the endpoints it talks to.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub tenant_id: Uuid,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
    pub authority_host: String,
    pub management_endpoint: String,
}

impl ClientConfig {
    pub fn build(settings: ClientSettings) -> Result<Self, VaultError> {
        let tenant_id = required("tenant id", &settings.tenant_id)?;
        let tenant_id = Uuid::parse_str(tenant_id)
            .map_err(|e| VaultError::Config(format!("tenant id is not a valid GUID: {}", e)))?;
        let client_id = required("client id", &settings.client_id)?;
        let client_secret = required("client secret", &settings.client_secret)?;
        let subscription_id = required("subscription id", &settings.subscription_id)?;

        Ok(Self {
            tenant_id,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            subscription_id: subscription_id.to_string(),
            authority_host: or_default(settings.authority_host.as_deref(), DEFAULT_AUTHORITY_HOST),
            management_endpoint: or_default(
                settings.management_endpoint.as_deref(),
                DEFAULT_MANAGEMENT_ENDPOINT,
            ),
        })
    }
}

/// Validated configuration of a sample run.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub client: ClientConfig,
    pub network: NetworkAccessConfig,
}

impl SampleConfig {
    pub fn build(settings: SampleSettings) -> Result<Self, VaultError> {
        let client = ClientConfig::build(settings.client)?;
        let resource_group = required("resource group", &settings.resource_group)?;
        let subnet_resource_id = required("subnet resource id", &settings.subnet_resource_id)?;

        let location = or_default(settings.location.as_deref(), DEFAULT_LOCATION);
        let vault_name = or_default(settings.vault_name.as_deref(), DEFAULT_VAULT_NAME);
        validate_vault_name(&vault_name)?;

        let ip_address = or_default(settings.ip_address.as_deref(), DEFAULT_IP_ADDRESS);
        validate_ip_rule(&ip_address)?;

        let subnet = subnet_coordinates(subnet_resource_id)?;

        let accessor_object_id = settings
            .accessor_object_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            network: NetworkAccessConfig {
                tenant_id: client.tenant_id,
                vault_resource_group: resource_group.to_string(),
                vault_name,
                location,
                accessor_object_id,
                enable_soft_delete: settings.enable_soft_delete,
                subnet,
                ip_address,
                vnet_address_space: DEFAULT_VNET_ADDRESS_SPACE.to_string(),
                subnet_address_prefix: DEFAULT_SUBNET_ADDRESS_PREFIX.to_string(),
                initial_backoff_secs: settings
                    .initial_backoff_secs
                    .unwrap_or(DEFAULT_INITIAL_BACKOFF_SECS),
                max_attempts: settings.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
            },
            client,
        })
    }
}

/// Checks a vault name before any remote call is made.
pub fn validate_vault_name(name: &str) -> Result<(), VaultError> {
    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !(3..=24).contains(&name.len()) || !valid_chars {
        return Err(VaultError::Config(format!(
            "vault name '{}' must be 3-24 letters, digits or dashes",
            name
        )));
    }
    Ok(())
}

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, VaultError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(VaultError::Config(format!("{} is required", name)));
    }
    Ok(value)
}

fn or_default(value: Option<&str>, default: &str) -> String {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Accepts an address or an address with a prefix length.
fn validate_ip_rule(rule: &str) -> Result<(), VaultError> {
    let (addr, prefix) = match rule.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (rule, None),
    };
    let addr: IpAddr = addr
        .parse()
        .map_err(|_| VaultError::Config(format!("'{}' is not an IP address", rule)))?;
    if let Some(prefix) = prefix {
        let max = if addr.is_ipv4() { 32 } else { 128 };
        match prefix.parse::<u8>() {
            Ok(len) if len <= max => {}
            _ => {
                return Err(VaultError::Config(format!(
                    "'{}' has an invalid prefix length",
                    rule
                )))
            }
        }
    }
    Ok(())
}
