//! A provider assembled from an OAuth2 client and an injected verifier.

use crate::client::OAuth2Client;
use async_trait::async_trait;
use std::sync::Arc;
use teamgate_identity_core::{Credential, IdentityClient, IdentityResult, Provider, Verifier};

/// [`Provider`] that delegates the OAuth2 capabilities to an [`OAuth2Client`]
/// and verification to whatever [`Verifier`] it was built with.
pub struct OAuthProvider {
    name: String,
    display_name: String,
    client: OAuth2Client,
    verifier: Arc<dyn Verifier>,
}

impl OAuthProvider {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        client: OAuth2Client,
        verifier: Arc<dyn Verifier>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            client,
            verifier,
        }
    }
}

#[async_trait]
impl Provider for OAuthProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn auth_code_url(&self, state: &str) -> String {
        self.client.auth_code_url(state)
    }

    async fn exchange(&self, code: &str) -> IdentityResult<Credential> {
        Ok(self.client.exchange_code(code).await?)
    }

    fn client(&self, credential: Credential) -> IdentityClient {
        self.client.identity_client(credential)
    }

    async fn verify(&self, client: &IdentityClient) -> IdentityResult<bool> {
        self.verifier.verify(client).await
    }
}
