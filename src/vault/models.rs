//! Management and data plane payloads.
//!
//! Only the fields this crate reads or writes are modelled; everything else is
//! carried through `extra` so a read-modify-write cycle keeps server state intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Service endpoint a subnet needs for vault network rules to apply.
pub const KEY_VAULT_SERVICE_ENDPOINT: &str = "Microsoft.KeyVault";

/// Permissions granted to the accessor identity on newly created vaults.
pub const SECRET_PERMISSIONS: [&str; 8] = [
    "get", "set", "list", "delete", "recover", "backup", "restore", "purge",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bypass {
    None,
    AzureServices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNetworkRule {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRule {
    pub value: String,
}

/// Network ACL of a vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRuleSet {
    pub bypass: Bypass,
    pub default_action: DefaultAction,
    #[serde(default)]
    pub ip_rules: Vec<IpRule>,
    #[serde(default)]
    pub virtual_network_rules: Vec<VirtualNetworkRule>,
}

impl Default for NetworkRuleSet {
    /// Services bypass the ACL and access is allowed.
    fn default() -> Self {
        Self {
            bypass: Bypass::AzureServices,
            default_action: DefaultAction::Allow,
            ip_rules: Vec::new(),
            virtual_network_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    pub family: String,
    pub name: String,
}

impl Default for Sku {
    fn default() -> Self {
        Self {
            family: "A".to_string(),
            name: "standard".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicyEntry {
    pub tenant_id: Uuid,
    pub object_id: String,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultProperties {
    pub tenant_id: Uuid,
    pub sku: Sku,
    #[serde(default)]
    pub access_policies: Vec<AccessPolicyEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_acls: Option<NetworkRuleSet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VaultProperties {
    /// Properties for a new vault owned by `tenant_id`.
    ///
    /// When `accessor_object_id` is given, that identity receives the full set
    /// of secret permissions so it can exercise the data plane.
    pub fn new(tenant_id: Uuid, accessor_object_id: Option<&str>, enable_soft_delete: bool) -> Self {
        let access_policies = accessor_object_id
            .map(|object_id| AccessPolicyEntry {
                tenant_id,
                object_id: object_id.to_string(),
                permissions: Permissions {
                    secrets: SECRET_PERMISSIONS.iter().map(|p| p.to_string()).collect(),
                    ..Default::default()
                },
            })
            .into_iter()
            .collect();

        let mut extra = Map::new();
        extra.insert("enabledForDeployment".to_string(), Value::Bool(false));
        extra.insert("enabledForDiskEncryption".to_string(), Value::Bool(false));
        extra.insert("enabledForTemplateDeployment".to_string(), Value::Bool(false));
        extra.insert("createMode".to_string(), Value::String("default".to_string()));
        if enable_soft_delete {
            extra.insert("enableSoftDelete".to_string(), Value::Bool(true));
        }

        Self {
            tenant_id,
            sku: Sku::default(),
            access_policies,
            vault_uri: None,
            network_acls: None,
            extra,
        }
    }
}

/// Vault as returned by the management plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vault {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub location: String,
    pub properties: VaultProperties,
}

/// Body of a vault create-or-update call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaultCreateOrUpdateParameters {
    pub location: String,
    pub properties: VaultProperties,
}

impl From<&Vault> for VaultCreateOrUpdateParameters {
    fn from(vault: &Vault) -> Self {
        Self {
            location: vault.location.clone(),
            properties: vault.properties.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_endpoints: Vec<ServiceEndpoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub properties: SubnetProperties,
}

impl Subnet {
    /// Subnet with the vault service endpoint enabled.
    pub fn with_vault_endpoint(name: &str, address_prefix: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            properties: SubnetProperties {
                address_prefix: Some(address_prefix.to_string()),
                service_endpoints: vec![ServiceEndpoint {
                    service: KEY_VAULT_SERVICE_ENDPOINT.to_string(),
                }],
                extra: Map::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    #[serde(default)]
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkProperties {
    #[serde(default)]
    pub address_space: AddressSpace,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    #[serde(default)]
    pub properties: VirtualNetworkProperties,
}

impl VirtualNetwork {
    /// A new network with a single address space and one subnet.
    pub fn new(location: &str, address_space: &str, subnet: Subnet) -> Self {
        Self {
            id: None,
            name: None,
            location: location.to_string(),
            properties: VirtualNetworkProperties {
                address_space: AddressSpace {
                    address_prefixes: vec![address_space.to_string()],
                },
                subnets: vec![subnet],
                extra: Map::new(),
            },
        }
    }

    /// Looks up a subnet by name, ignoring case.
    pub fn find_subnet(&self, name: &str) -> Option<&Subnet> {
        self.properties
            .subnets
            .iter()
            .find(|subnet| subnet.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecretItem {
    pub id: String,
}

/// One page of the data plane secret listing.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretList {
    #[serde(default)]
    pub value: Vec<SecretItem>,
    #[serde(default)]
    pub next_link: Option<String>,
}
