//! Exchanged OAuth2 credentials and the HTTP client handle built from them.

use reqwest::{Client, IntoUrl, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token endpoint response produced by a successful code exchange.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            refresh_token: None,
            scope: None,
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// HTTP client that attaches the exchanged credential to every request.
///
/// Verifiers only ever see this handle, so the identity backends they call are
/// always queried as the user who just completed the OAuth flow.
#[derive(Clone, Debug)]
pub struct IdentityClient {
    http: Client,
    credential: Credential,
}

impl IdentityClient {
    pub fn new(http: Client, credential: Credential) -> Self {
        Self { http, credential }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(&self.credential.access_token)
    }
}
