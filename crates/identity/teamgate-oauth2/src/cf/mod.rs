//! Cloud Foundry login: anyone UAA lets through is accepted.

use crate::client::OAuth2Client;
use crate::config::OAuth2ClientConfig;
use crate::provider::OAuthProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use teamgate_identity_core::{
    AggregateError, IdentityClient, IdentityError, IdentityResult, Provider, ProviderConstructor,
    Verifier,
};

pub const PROVIDER_NAME: &str = "cf";
pub const DISPLAY_NAME: &str = "CF";

pub const SCOPES: &[&str] = &["cloud_controller.read"];

pub struct NoopVerifier;

#[async_trait]
impl Verifier for NoopVerifier {
    async fn verify(&self, _client: &IdentityClient) -> IdentityResult<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub auth_url: String,
    #[serde(default)]
    pub token_url: String,
}

impl CfAuthConfig {
    pub fn validate(&self) -> IdentityResult<()> {
        let mut errors = AggregateError::new();

        if self.client_id.is_empty() || self.client_secret.is_empty() {
            errors.push(IdentityError::InvalidConfig(
                "must specify client_id and client_secret to use CF OAuth".to_string(),
            ));
        }
        if self.auth_url.is_empty() || self.token_url.is_empty() {
            errors.push(IdentityError::InvalidConfig(
                "must specify auth_url and token_url to use CF OAuth".to_string(),
            ));
        }

        errors.into_result()
    }
}

#[derive(Clone, Default)]
pub struct CfProviderConstructor {
    http_client: reqwest::Client,
}

impl CfProviderConstructor {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    fn parse(config: &serde_json::Value) -> IdentityResult<CfAuthConfig> {
        Ok(serde_json::from_value(config.clone())?)
    }
}

impl ProviderConstructor for CfProviderConstructor {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn validate(&self, config: &serde_json::Value) -> IdentityResult<()> {
        Self::parse(config)?.validate()
    }

    fn construct(
        &self,
        config: &serde_json::Value,
        redirect_url: &str,
    ) -> IdentityResult<Arc<dyn Provider>> {
        let config = Self::parse(config)?;
        config.validate()?;

        let oauth2 = OAuth2ClientConfig::new(
            config.client_id,
            config.client_secret,
            config.auth_url,
            config.token_url,
            redirect_url,
        )
        .with_scopes(SCOPES.iter().copied());

        Ok(Arc::new(OAuthProvider::new(
            PROVIDER_NAME,
            DISPLAY_NAME,
            OAuth2Client::new(self.http_client.clone(), oauth2)?,
            Arc::new(NoopVerifier),
        )))
    }
}
