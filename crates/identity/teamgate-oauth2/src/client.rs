//! Authorization code flow against a single OAuth2 provider.

use crate::config::OAuth2ClientConfig;
use crate::error::{OAuth2Error, OAuth2Result};
use reqwest::Client;
use reqwest::header::ACCEPT;
use std::collections::HashMap;
use teamgate_identity_core::{Credential, IdentityClient};
use tracing::{debug, error};
use url::Url;

#[derive(Clone, Debug)]
pub struct OAuth2Client {
    http_client: Client,
    config: OAuth2ClientConfig,
    auth_url: Url,
}

impl OAuth2Client {
    /// Fails when the authorization or token endpoint is not a valid URL.
    pub fn new(http_client: Client, config: OAuth2ClientConfig) -> OAuth2Result<Self> {
        let auth_url = Url::parse(&config.auth_url)?;
        Url::parse(&config.token_url)?;

        Ok(Self {
            http_client,
            config,
            auth_url,
        })
    }

    pub fn config(&self) -> &OAuth2ClientConfig {
        &self.config
    }

    /// Authorization URL for the user agent, carrying `state` untouched.
    pub fn auth_code_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();

        let mut params = url.query_pairs_mut();
        params.append_pair("response_type", "code");
        params.append_pair("client_id", &self.config.client_id);
        params.append_pair("redirect_uri", &self.config.redirect_url);
        if !self.config.scopes.is_empty() {
            params.append_pair("scope", &self.config.scopes.join(" "));
        }
        params.append_pair("state", state);
        drop(params);

        url.to_string()
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> OAuth2Result<Credential> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("client_id", &self.config.client_id);
        params.insert("client_secret", &self.config.client_secret);
        params.insert("redirect_uri", &self.config.redirect_url);

        let response = self
            .http_client
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "token exchange failed: {}", error_text);
            return Err(OAuth2Error::TokenExchangeFailed(format!(
                "token endpoint answered {status}"
            )));
        }

        let credential: Credential = response
            .json()
            .await
            .map_err(|e| OAuth2Error::InvalidTokenResponse(e.to_string()))?;

        if credential.access_token.is_empty() {
            return Err(OAuth2Error::InvalidTokenResponse(
                "empty access token".to_string(),
            ));
        }

        debug!("exchanged authorization code for access token");
        Ok(credential)
    }

    /// HTTP client acting with `credential`.
    pub fn identity_client(&self, credential: Credential) -> IdentityClient {
        IdentityClient::new(self.http_client.clone(), credential)
    }
}
