//! Client implementation for Azure REST API interactions.
//!
//! This module provides a client for making authenticated HTTP requests to the
//! resource manager and the vault data plane, mapping failed responses onto
//! [`VaultError`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::debug;

use crate::vault::auth::{ServicePrincipalCredential, TokenScope};
use crate::vault::VaultError;

/// Header tying together the requests of one run in server-side logs.
pub const CORRELATION_HEADER: &str = "x-ms-correlation-request-id";

/// Client for interacting with an Azure HTTP API on behalf of a credential.
pub struct AzureClient {
    credential: Arc<ServicePrincipalCredential>,
    scope: TokenScope,
    /// HTTP client for making requests
    client: Client,
    /// Custom headers to add to requests
    custom_headers: HeaderMap,
}

impl AzureClient {
    /// Creates a client that authenticates with tokens for `scope`.
    pub fn new(
        credential: Arc<ServicePrincipalCredential>,
        scope: TokenScope,
    ) -> Result<Self, VaultError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VaultError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            credential,
            scope,
            client,
            custom_headers: HeaderMap::new(),
        })
    }

    /// Adds a custom header to every request.
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        if let (Ok(header_name), Ok(header_value)) =
            (HeaderName::from_str(name), HeaderValue::from_str(value))
        {
            self.custom_headers.insert(header_name, header_value);
        }
        self
    }

    /// Makes a GET request and deserializes the response body.
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, VaultError> {
        let value = self.request(Method::GET, url, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Makes a PUT request with a JSON body and deserializes the response body.
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, VaultError> {
        let body = serde_json::to_value(body)?;
        let value = self.request(Method::PUT, url, Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Value, VaultError> {
        let token = self.credential.token(self.scope).await?;
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url).bearer_auth(token);

        for (name, value) in self.custom_headers.iter() {
            request = request.header(name, value);
        }

        if let Some(json_body) = body {
            request = request.json(&json_body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VaultError::from_status(status, error_message(&error_text)));
        }

        // Return an empty JSON object for 204 No Content responses
        if status == StatusCode::NO_CONTENT {
            return Ok(json!({}));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| VaultError::ParseError(format!("Failed to parse response: {}", e)))
    }
}

/// Extracts `error.message` from an Azure error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|val| {
            val.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
