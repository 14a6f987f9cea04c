//! Identity error types.

use std::fmt;
use thiserror::Error;

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Every error collected while trying a set of alternatives.
///
/// Nothing is dropped: the rendered message contains the text of each member.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<IdentityError>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: IdentityError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when nothing was collected, otherwise the aggregate itself.
    pub fn into_result(self) -> IdentityResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(IdentityError::Aggregate(self))
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "error" } else { "errors" };
        write!(f, "{} {} occurred:", self.errors.len(), noun)?;
        for error in &self.errors {
            write!(f, "\n\t* {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

impl Extend<IdentityError> for AggregateError {
    fn extend<I: IntoIterator<Item = IdentityError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}
