use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::{
    validate_vault_name, ClientConfig, ClientSettings, SampleConfig, SampleSettings,
    DEFAULT_INITIAL_BACKOFF_SECS, DEFAULT_IP_ADDRESS, DEFAULT_LOCATION, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_VAULT_NAME,
};
use crate::interface::VaultManagement;
use crate::vault::{
    KeyVaultDataClient, KeyVaultManagementClient, NetworkAccessRun, NetworkManagementClient,
    ProbeOutcome, ResourceIdentifier, RunReport, ServicePrincipalCredential, VaultError,
};

#[derive(Parser)]
#[command(
    name = "keyvault-vnet",
    about = "Key Vault virtual network access rule sample",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add vnet and IP rules to a vault, enforce them, verify, then remove them.
    Run {
        #[command(flatten)]
        connection: ConnectionArgs,
        #[command(flatten)]
        vault: VaultArgs,
        /// Resource id of the subnet allowed to reach the vault.
        #[arg(long, env = "KV_SUBNET_RESOURCE_ID")]
        subnet_resource_id: String,
        /// Object id of the identity granted secret permissions on a new vault.
        #[arg(long, env = "KV_ACCESSOR_OBJECT_ID")]
        accessor_object_id: Option<String>,
        /// Address (or CIDR range) for the IP access rule.
        #[arg(long, env = "KV_IP_ADDRESS", default_value = DEFAULT_IP_ADDRESS)]
        ip_address: String,
        /// Location for resources created by the sample.
        #[arg(long, env = "KV_LOCATION", default_value = DEFAULT_LOCATION)]
        location: String,
        /// Enable soft delete on a newly created vault.
        #[arg(long)]
        enable_soft_delete: bool,
        /// Seconds to wait before the first retry; doubled on every retry.
        #[arg(long, env = "KV_RETRY_INITIAL_BACKOFF", default_value_t = DEFAULT_INITIAL_BACKOFF_SECS)]
        initial_backoff_secs: u64,
        /// Maximum attempts for retried calls.
        #[arg(long, env = "KV_RETRY_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,
    },
    /// Print the coordinates of a resource identifier.
    Parse {
        resource_id: String,
    },
    /// Print the current network ACL of a vault.
    ShowAcl {
        #[command(flatten)]
        connection: ConnectionArgs,
        #[command(flatten)]
        vault: VaultArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Directory (tenant) id of the application.
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: String,
    /// Application (client) id.
    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub client_id: String,
    /// Application secret.
    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,
    /// Subscription holding the vault.
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: String,
    /// Token authority, e.g. for sovereign clouds.
    #[arg(long, env = "AZURE_AUTHORITY_HOST")]
    pub authority_host: Option<String>,
    /// Resource manager endpoint.
    #[arg(long, env = "AZURE_MANAGEMENT_ENDPOINT")]
    pub management_endpoint: Option<String>,
}

impl From<ConnectionArgs> for ClientSettings {
    fn from(args: ConnectionArgs) -> Self {
        Self {
            tenant_id: args.tenant_id,
            client_id: args.client_id,
            client_secret: args.client_secret,
            subscription_id: args.subscription_id,
            authority_host: args.authority_host,
            management_endpoint: args.management_endpoint,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct VaultArgs {
    /// Resource group of the vault.
    #[arg(long, env = "KV_RESOURCE_GROUP")]
    pub resource_group: String,
    /// Name of the vault.
    #[arg(long, env = "KV_VAULT_NAME", default_value = DEFAULT_VAULT_NAME)]
    pub vault_name: String,
}

/// Credential and clients shared by the steps of one invocation.
pub struct RunContext {
    pub config: ClientConfig,
    /// Sent with every request so the run can be traced server side.
    pub correlation_id: Uuid,
    credential: Arc<ServicePrincipalCredential>,
}

impl RunContext {
    pub fn new(config: ClientConfig) -> Result<Self, VaultError> {
        let credential = Arc::new(ServicePrincipalCredential::new(
            config.tenant_id,
            &config.client_id,
            &config.client_secret,
            &config.authority_host,
        )?);
        let correlation_id = Uuid::new_v4();
        info!("Correlation id for this run: {}", correlation_id);
        Ok(Self {
            config,
            correlation_id,
            credential,
        })
    }

    pub fn vault_client(&self) -> Result<KeyVaultManagementClient, VaultError> {
        Ok(KeyVaultManagementClient::new(
            self.credential.clone(),
            &self.config.management_endpoint,
            &self.config.subscription_id,
        )?
        .with_correlation_id(self.correlation_id))
    }

    /// Network client scoped to the subscription that owns the subnet.
    pub fn network_client(&self, subscription_id: &str) -> Result<NetworkManagementClient, VaultError> {
        Ok(NetworkManagementClient::new(
            self.credential.clone(),
            &self.config.management_endpoint,
            subscription_id,
        )?
        .with_correlation_id(self.correlation_id))
    }

    pub fn data_client(&self) -> Result<KeyVaultDataClient, VaultError> {
        Ok(KeyVaultDataClient::new(self.credential.clone())?.with_correlation_id(self.correlation_id))
    }
}

/// Runs the complete network access sample.
pub async fn run_sample(config: &SampleConfig) -> Result<RunReport, VaultError> {
    let context = RunContext::new(config.client.clone())?;
    let vaults = context.vault_client()?;
    let networks = context.network_client(&config.network.subnet.subscription)?;
    let data = context.data_client()?;

    NetworkAccessRun::new(&vaults, &networks, &data, &config.network)
        .run()
        .await
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            connection,
            vault,
            subnet_resource_id,
            accessor_object_id,
            ip_address,
            location,
            enable_soft_delete,
            initial_backoff_secs,
            max_attempts,
        } => {
            let config = SampleConfig::build(SampleSettings {
                client: connection.into(),
                resource_group: vault.resource_group,
                location: Some(location),
                vault_name: Some(vault.vault_name),
                subnet_resource_id,
                accessor_object_id,
                ip_address: Some(ip_address),
                enable_soft_delete,
                initial_backoff_secs: Some(initial_backoff_secs),
                max_attempts: Some(max_attempts),
            })
            .context("Invalid configuration")?;

            info!("Running Key Vault vnet access rule management sample");
            match run_sample(&config).await {
                Ok(report) => log_report(&report),
                Err(err) => {
                    error!("Sample run failed: {}", err);
                    return Err(anyhow::anyhow!("Failed to manage network access: {}", err));
                }
            }
        }

        Commands::Parse { resource_id } => {
            let id = ResourceIdentifier::parse(&resource_id)?;
            info!("Subscription: {}", id.subscription());
            info!("Resource group: {}", id.resource_group());
            info!("Provider: {}", id.provider());
            info!("Type: {}", id.resource_type());
            info!("Name: {}", id.resource_name());
            if let (Some(child_type), Some(child_name)) = (id.child_type(), id.child_name()) {
                info!("Child: {} {}", child_type, child_name);
            }
            info!(
                "Virtual network or subnet: {}",
                id.is_virtual_network_or_subnet()
            );
        }

        Commands::ShowAcl { connection, vault } => {
            validate_vault_name(&vault.vault_name)?;
            let config = ClientConfig::build(connection.into()).context("Invalid configuration")?;
            let context = RunContext::new(config)?;
            let client = context.vault_client()?;

            let found = client
                .get_vault(&vault.resource_group, &vault.vault_name)
                .await
                .with_context(|| format!("Failed to retrieve vault '{}'", vault.vault_name))?;

            match found.properties.network_acls {
                None => info!("Vault '{}' has no network ACL", vault.vault_name),
                Some(acl) => {
                    info!(
                        "Bypass: {:?}, default action: {:?}",
                        acl.bypass, acl.default_action
                    );
                    for rule in &acl.virtual_network_rules {
                        info!("Vnet rule: {}", rule.id);
                    }
                    for rule in &acl.ip_rules {
                        info!("IP rule: {}", rule.value);
                    }
                }
            }
        }
    }
    Ok(())
}

fn log_report(report: &RunReport) {
    info!(
        "Created: vnet = {}, subnet = {}, vault = {}",
        report.vnet_created, report.subnet_created, report.vault_created
    );
    info!(
        "Rules updated: {}, enforcement enabled: {}",
        report.rules_updated, report.enforcement_enabled
    );
    info!(
        "Access with enforcement: {}",
        describe(report.enforced_probe)
    );
    info!(
        "Access after removing rules: {}",
        describe(report.restored_probe)
    );
}

fn describe(outcome: ProbeOutcome) -> &'static str {
    match outcome {
        ProbeOutcome::Allowed => "allowed",
        ProbeOutcome::Forbidden => "forbidden",
    }
}
