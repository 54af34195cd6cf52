//! Model client implementations.
//!
//! Contains the Anthropic implementation of the
//! [`ModelClient`](revlens_core::llm::client::ModelClient) port, a
//! constructor ([`create_client`]) that picks the client for a
//! [`ModelConfig`], and [`ConfiguredClientFactory`], which resolves the API
//! key through a credential chain on every request.

pub mod anthropic;

use secrecy::SecretString;

use revlens_core::credential::CredentialChain;
use revlens_core::llm::box_client::BoxModelClient;
use revlens_core::llm::factory::ModelClientFactory;
use revlens_types::config::ModelConfig;
use revlens_types::llm::{LlmError, ProviderType};

use self::anthropic::AnthropicClient;

/// Create a [`BoxModelClient`] from a [`ModelConfig`].
///
/// Returns `AuthenticationFailed` when the provider needs a key and none
/// was resolved.
pub fn create_client(config: &ModelConfig, api_key: Option<&str>) -> Result<BoxModelClient, LlmError> {
    match config.provider {
        ProviderType::Anthropic => {
            let key = api_key
                .filter(|k| !k.trim().is_empty())
                .ok_or(LlmError::AuthenticationFailed)?;
            let secret = SecretString::from(key.to_string());
            let mut client = AnthropicClient::new(secret, config.model.clone())?;
            if let Some(base_url) = &config.base_url {
                client = client.with_base_url(base_url.clone());
            }
            Ok(BoxModelClient::new(client))
        }
    }
}

/// Factory that builds a client from configuration and stored credentials.
///
/// The key is looked up on every `create`, so a key stored or cleared
/// between requests takes effect immediately.
pub struct ConfiguredClientFactory {
    config: ModelConfig,
    credentials: CredentialChain,
}

impl ConfiguredClientFactory {
    pub fn new(config: ModelConfig, credentials: CredentialChain) -> Self {
        Self {
            config,
            credentials,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

impl ModelClientFactory for ConfiguredClientFactory {
    async fn create(&self) -> Result<BoxModelClient, LlmError> {
        let key = self
            .credentials
            .resolve(&self.config.api_key_secret_name)
            .await;
        if key.is_none() {
            tracing::warn!(
                secret = %self.config.api_key_secret_name,
                stores = ?self.credentials.store_names(),
                "no API key found in any credential store"
            );
        }
        create_client(&self.config, key.as_deref())
    }
}
