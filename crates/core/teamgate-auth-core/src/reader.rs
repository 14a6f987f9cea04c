use crate::identity::TeamClaims;
use http::HeaderMap;
use std::sync::Arc;
use teamgate_session::{TokenCodec, bearer_token};

/// Extracts the caller's team from a request.
pub trait UserContextReader: Send + Sync {
    fn get_team(&self, headers: &HeaderMap) -> TeamClaims;
}

impl<R: UserContextReader + ?Sized> UserContextReader for Arc<R> {
    fn get_team(&self, headers: &HeaderMap) -> TeamClaims {
        (**self).get_team(headers)
    }
}

/// Reads team claims out of a verified session token.
#[derive(Clone)]
pub struct JwtReader {
    codec: Arc<TokenCodec>,
}

impl JwtReader {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }
}

impl UserContextReader for JwtReader {
    fn get_team(&self, headers: &HeaderMap) -> TeamClaims {
        bearer_token(headers)
            .and_then(|token| self.codec.verify(&token).ok())
            .map(|session| TeamClaims::from(session.claims))
            .unwrap_or_default()
    }
}
