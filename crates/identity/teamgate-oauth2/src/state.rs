//! CSRF state round-tripped through the provider.

use crate::error::{OAuth2Error, OAuth2Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Where to send the user after login, and which team they are logging into.
///
/// Encoded as base64url JSON and stored both in the `oauth_state` cookie and
/// the provider's `state` parameter. Equality of the two is the CSRF check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfState {
    #[serde(default)]
    pub redirect: String,
    pub team_name: String,
}

impl CsrfState {
    pub fn new(redirect: impl Into<String>, team_name: impl Into<String>) -> Self {
        Self {
            redirect: redirect.into(),
            team_name: team_name.into(),
        }
    }

    pub fn encode(&self) -> OAuth2Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    pub fn decode(encoded: &str) -> OAuth2Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| OAuth2Error::InvalidState)?;
        serde_json::from_slice(&bytes).map_err(|_| OAuth2Error::InvalidState)
    }
}

/// Byte-for-byte comparison of the cookie and query copies of the state.
pub fn states_match(cookie: &str, query: &str) -> bool {
    cookie.as_bytes().ct_eq(query.as_bytes()).into()
}
