//! Service principal authentication.
//!
//! Tokens are obtained with the OAuth2 client credentials grant and cached per
//! scope for the lifetime of the credential. A credential is created once per
//! run and handed to every client that needs it.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::vault::VaultError;

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Resources the sample requests tokens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    /// Resource manager (vaults and virtual networks).
    Management,
    /// Vault data plane (secrets).
    KeyVault,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Management => "https://management.azure.com/.default",
            TokenScope::KeyVault => "https://vault.azure.net/.default",
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Application identity used for both management and data plane calls.
pub struct ServicePrincipalCredential {
    tenant_id: Uuid,
    client_id: String,
    client_secret: String,
    authority_host: String,
    client: Client,
    management_token: OnceCell<String>,
    key_vault_token: OnceCell<String>,
}

impl ServicePrincipalCredential {
    pub fn new(
        tenant_id: Uuid,
        client_id: &str,
        client_secret: &str,
        authority_host: &str,
    ) -> Result<Self, VaultError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VaultError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            tenant_id,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            authority_host: authority_host.trim_end_matches('/').to_string(),
            client,
            management_token: OnceCell::new(),
            key_vault_token: OnceCell::new(),
        })
    }

    /// Returns a bearer token for `scope`, requesting one on first use.
    pub async fn token(&self, scope: TokenScope) -> Result<String, VaultError> {
        let cell = match scope {
            TokenScope::Management => &self.management_token,
            TokenScope::KeyVault => &self.key_vault_token,
        };
        cell.get_or_try_init(|| self.acquire_token(scope))
            .await
            .cloned()
    }

    async fn acquire_token(&self, scope: TokenScope) -> Result<String, VaultError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host, self.tenant_id
        );
        debug!("Requesting token for {} from {}", scope.as_str(), url);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| VaultError::Network(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VaultError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| VaultError::Auth(format!("Failed to parse token response: {}", e)))?;
        info!(
            "Acquired token for {} (expires in {}s)",
            scope.as_str(),
            token.expires_in.unwrap_or_default()
        );
        Ok(token.access_token)
    }
}

impl std::fmt::Debug for ServicePrincipalCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePrincipalCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("authority_host", &self.authority_host)
            .finish_non_exhaustive()
    }
}
