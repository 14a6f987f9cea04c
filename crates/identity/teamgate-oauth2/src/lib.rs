//! OAuth2 login for team-scoped sessions.
//!
//! [`oauth_routes`] serves the begin and callback endpoints. Providers are
//! resolved per team through a [`ProviderRegistry`](teamgate_identity_core::ProviderRegistry)
//! populated with the constructors in [`github`], [`uaa`] and [`cf`].

pub mod cf;
pub mod client;
pub mod config;
pub mod error;
pub mod github;
pub mod handlers;
pub mod provider;
pub mod state;
pub mod uaa;


pub use client::OAuth2Client;
pub use config::OAuth2ClientConfig;
pub use error::{OAuth2Error, OAuth2Result};
pub use handlers::{
    BeginParams, CallbackParams, DEFAULT_COOKIE_AGE_SECS, OAuthError, OAuthHandlerState,
    oauth_begin, oauth_callback, oauth_routes,
};
pub use provider::OAuthProvider;
pub use state::CsrfState;
