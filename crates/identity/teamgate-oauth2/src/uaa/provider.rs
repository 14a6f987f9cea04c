use super::verifier::SpaceVerifier;
use super::{DISPLAY_NAME, PROVIDER_NAME, SCOPES};
use crate::client::OAuth2Client;
use crate::config::OAuth2ClientConfig;
use crate::provider::OAuthProvider;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use teamgate_identity_core::{
    AggregateError, IdentityError, IdentityResult, Provider, ProviderConstructor,
};

/// Per-team UAA settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UaaAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub auth_url: String,
    #[serde(default)]
    pub token_url: String,
    /// GUIDs of the spaces whose developers are let in.
    #[serde(default)]
    pub cf_spaces: Vec<String>,
    #[serde(default)]
    pub cf_url: String,
    /// PEM bundle trusted when talking to UAA and the CF API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf_ca_cert: Option<String>,
}

impl UaaAuthConfig {
    pub fn validate(&self) -> IdentityResult<()> {
        let mut errors = AggregateError::new();

        if self.client_id.is_empty() || self.client_secret.is_empty() {
            errors.push(IdentityError::InvalidConfig(
                "must specify client_id and client_secret to use UAA OAuth".to_string(),
            ));
        }
        if self.cf_spaces.is_empty() {
            errors.push(IdentityError::InvalidConfig(
                "must specify cf_spaces to use UAA OAuth".to_string(),
            ));
        }
        if self.auth_url.is_empty() || self.token_url.is_empty() || self.cf_url.is_empty() {
            errors.push(IdentityError::InvalidConfig(
                "must specify auth_url, token_url and cf_url to use UAA OAuth".to_string(),
            ));
        }

        errors.into_result()
    }
}

/// Builds UAA providers.
///
/// Teams trusting a custom CA get their own HTTP client, built on first use
/// and shared by every later login with the same `cf_ca_cert`.
#[derive(Clone, Default)]
pub struct UaaProviderConstructor {
    http_client: reqwest::Client,
    ca_clients: Arc<DashMap<String, reqwest::Client>>,
}

impl UaaProviderConstructor {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            ca_clients: Arc::new(DashMap::new()),
        }
    }

    fn parse(config: &serde_json::Value) -> IdentityResult<UaaAuthConfig> {
        Ok(serde_json::from_value(config.clone())?)
    }

    fn http_client(&self, ca_cert: Option<&str>) -> IdentityResult<reqwest::Client> {
        let Some(pem) = ca_cert.filter(|pem| !pem.trim().is_empty()) else {
            return Ok(self.http_client.clone());
        };

        let client = self
            .ca_clients
            .entry(pem.to_string())
            .or_try_insert_with(|| Self::build_ca_client(pem))?;
        Ok(client.value().clone())
    }

    fn build_ca_client(pem: &str) -> IdentityResult<reqwest::Client> {
        let certificate = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
            IdentityError::InvalidConfig(format!("failed to use cf_ca_cert: {e}"))
        })?;

        reqwest::Client::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|e| IdentityError::InvalidConfig(format!("failed to use cf_ca_cert: {e}")))
    }
}

impl ProviderConstructor for UaaProviderConstructor {
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

        let verifier = SpaceVerifier::new(config.cf_spaces.clone(), &config.cf_url)?;
        let http_client = self.http_client(config.cf_ca_cert.as_deref())?;

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
            OAuth2Client::new(http_client, oauth2)?,
            Arc::new(verifier),
        )))
    }
}
