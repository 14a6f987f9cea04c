//! Identity verification and OR-composition of verifiers.

use crate::credential::IdentityClient;
use crate::error::{AggregateError, IdentityResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Answers "is the identity behind this client allowed in?" against one
/// membership source (user list, organization, team, space...).
///
/// `Ok(false)` is a definitive "no"; `Err` means the source could not answer.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, client: &IdentityClient) -> IdentityResult<bool>;
}

#[async_trait]
impl<V: Verifier + ?Sized> Verifier for Arc<V> {
    async fn verify(&self, client: &IdentityClient) -> IdentityResult<bool> {
        (**self).verify(client).await
    }
}

/// Verifier that grants access when any of its members does.
///
/// Members are tried in order. The first `Ok(true)` wins and discards any
/// errors seen before it. Errors never stop the walk; if nobody said yes, the
/// collected errors are returned together, or `Ok(false)` when there were none.
#[derive(Clone, Default)]
pub struct VerifierBasket {
    verifiers: Vec<Arc<dyn Verifier>>,
}

impl VerifierBasket {
    pub fn new(verifiers: Vec<Arc<dyn Verifier>>) -> Self {
        Self { verifiers }
    }

    pub fn with(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifiers.push(verifier);
        self
    }
}

#[async_trait]
impl Verifier for VerifierBasket {
    async fn verify(&self, client: &IdentityClient) -> IdentityResult<bool> {
        let mut errors = AggregateError::new();

        for (index, verifier) in self.verifiers.iter().enumerate() {
            match verifier.verify(client).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(err) => {
                    debug!(verifier = index, error = %err, "verifier failed, trying next");
                    errors.push(err);
                }
            }
        }

        errors.into_result().map(|()| false)
    }
}
