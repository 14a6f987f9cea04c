//! OAuth2 error types.

use teamgate_identity_core::IdentityError;
use thiserror::Error;

pub type OAuth2Result<T> = Result<T, OAuth2Error>;

#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid state parameter")]
    InvalidState,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl From<OAuth2Error> for IdentityError {
    fn from(err: OAuth2Error) -> Self {
        match err {
            OAuth2Error::HttpError(err) => IdentityError::Http(err),
            OAuth2Error::ConfigError(msg) => IdentityError::InvalidConfig(msg),
            OAuth2Error::SerializationError(err) => IdentityError::SerializationError(err),
            other => IdentityError::ProviderError(other.to_string()),
        }
    }
}
