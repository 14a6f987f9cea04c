//! Core identity traits and types.
//!
//! A [`Provider`] bundles the OAuth2 capabilities of one identity backend with
//! a [`Verifier`] deciding whether the authenticated identity belongs to a
//! team. Providers are resolved per team through the [`ProviderRegistry`].

mod credential;
mod error;
mod provider;
mod registry;
mod verifier;

pub use credential::{Credential, IdentityClient};
pub use error::{AggregateError, IdentityError, IdentityResult};
pub use provider::{Provider, ProviderConstructor};
pub use registry::{
    ProviderRegistry, ProviderRegistryBuilder, ResolvedProvider, StaticTeams, Team, TeamContext,
    TeamSource,
};
pub use verifier::{Verifier, VerifierBasket};
