//! GitHub OAuth with user, organization and team membership checks.

mod client;
mod provider;
mod verifier;

pub use client::{GitHubApiClient, GitHubClient, OrganizationTeams};
pub use provider::{GitHubAuthConfig, GitHubProviderConstructor};
pub use verifier::{GitHubTeam, OrganizationVerifier, TeamVerifier, UserVerifier};

pub const PROVIDER_NAME: &str = "github";
pub const DISPLAY_NAME: &str = "GitHub";

pub const DEFAULT_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const DEFAULT_API_URL: &str = "https://api.github.com/";

pub const SCOPES: &[&str] = &["read:org"];
