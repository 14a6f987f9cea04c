use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a request was not allowed through to a team-scoped handler.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// No validator accepted the request's credentials.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The caller is authenticated, but for a different team (or none).
    #[error("Access to team '{requested}' denied (session team: {actual:?})")]
    Forbidden {
        requested: String,
        actual: Option<String>,
    },
}

pub type AuthResult<T = ()> = Result<T, AuthError>;
