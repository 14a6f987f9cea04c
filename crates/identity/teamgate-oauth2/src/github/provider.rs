use super::client::{GitHubApiClient, GitHubClient};
use super::verifier::{GitHubTeam, OrganizationVerifier, TeamVerifier, UserVerifier};
use super::{DEFAULT_API_URL, DEFAULT_AUTH_URL, DEFAULT_TOKEN_URL, DISPLAY_NAME, PROVIDER_NAME, SCOPES};
use crate::client::OAuth2Client;
use crate::config::OAuth2ClientConfig;
use crate::provider::OAuthProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use teamgate_identity_core::{
    AggregateError, IdentityError, IdentityResult, Provider, ProviderConstructor, VerifierBasket,
};

/// Per-team GitHub settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub teams: Vec<GitHubTeam>,
    #[serde(default)]
    pub users: Vec<String>,
    /// GitHub Enterprise endpoints; github.com when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl GitHubAuthConfig {
    pub fn validate(&self) -> IdentityResult<()> {
        let mut errors = AggregateError::new();

        if self.client_id.is_empty() || self.client_secret.is_empty() {
            errors.push(IdentityError::InvalidConfig(
                "must specify client_id and client_secret to use GitHub OAuth".to_string(),
            ));
        }
        if self.organizations.is_empty() && self.teams.is_empty() && self.users.is_empty() {
            errors.push(IdentityError::InvalidConfig(
                "at least one of organizations, teams or users must be specified to use GitHub OAuth"
                    .to_string(),
            ));
        }

        errors.into_result()
    }
}

/// Builds GitHub providers sharing one HTTP connection pool.
#[derive(Clone, Default)]
pub struct GitHubProviderConstructor {
    http_client: reqwest::Client,
}

impl GitHubProviderConstructor {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    fn parse(config: &serde_json::Value) -> IdentityResult<GitHubAuthConfig> {
        Ok(serde_json::from_value(config.clone())?)
    }
}

impl ProviderConstructor for GitHubProviderConstructor {
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

        let github: Arc<dyn GitHubClient> = Arc::new(GitHubApiClient::new(
            config.api_url.as_deref().unwrap_or(DEFAULT_API_URL),
        )?);

        let mut verifiers = VerifierBasket::default();
        if !config.organizations.is_empty() {
            verifiers = verifiers.with(Arc::new(OrganizationVerifier::new(
                config.organizations.clone(),
                github.clone(),
            )));
        }
        if !config.teams.is_empty() {
            verifiers = verifiers.with(Arc::new(TeamVerifier::new(
                config.teams.clone(),
                github.clone(),
            )));
        }
        if !config.users.is_empty() {
            verifiers = verifiers.with(Arc::new(UserVerifier::new(config.users.clone(), github)));
        }

        let oauth2 = OAuth2ClientConfig::new(
            config.client_id,
            config.client_secret,
            config.auth_url.as_deref().unwrap_or(DEFAULT_AUTH_URL),
            config.token_url.as_deref().unwrap_or(DEFAULT_TOKEN_URL),
            redirect_url,
        )
        .with_scopes(SCOPES.iter().copied());

        Ok(Arc::new(OAuthProvider::new(
            PROVIDER_NAME,
            DISPLAY_NAME,
            OAuth2Client::new(self.http_client.clone(), oauth2)?,
            Arc::new(verifiers),
        )))
    }
}
