//! The capability set every identity provider exposes.

use crate::credential::{Credential, IdentityClient};
use crate::error::IdentityResult;
use async_trait::async_trait;
use std::sync::Arc;

/// A named identity backend: it can start an OAuth2 authorization, exchange
/// the returned code, hand out an authenticated client and decide whether the
/// identity behind that client may access the team it was configured for.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry key, e.g. `github`.
    fn name(&self) -> &str;

    /// Human readable name shown on login pages.
    fn display_name(&self) -> &str;

    /// Authorization URL the user agent is redirected to, carrying `state`.
    fn auth_code_url(&self, state: &str) -> String;

    /// Exchange an authorization code for a credential.
    async fn exchange(&self, code: &str) -> IdentityResult<Credential>;

    /// Build an HTTP client acting on behalf of `credential`.
    fn client(&self, credential: Credential) -> IdentityClient;

    /// Whatever verification was injected when the provider was built.
    async fn verify(&self, client: &IdentityClient) -> IdentityResult<bool>;
}

/// Builds providers of one kind from per-team configuration.
///
/// Constructors are registered once at startup. Team configuration is opaque
/// JSON until the constructor for its provider name parses it.
pub trait ProviderConstructor: Send + Sync {
    fn name(&self) -> &str;

    /// Check a team's configuration for this provider, reporting every problem at once.
    fn validate(&self, config: &serde_json::Value) -> IdentityResult<()>;

    fn construct(
        &self,
        config: &serde_json::Value,
        redirect_url: &str,
    ) -> IdentityResult<Arc<dyn Provider>>;
}
