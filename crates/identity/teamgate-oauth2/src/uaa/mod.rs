//! UAA OAuth with Cloud Foundry space membership checks.

mod provider;
mod verifier;

pub use provider::{UaaAuthConfig, UaaProviderConstructor};
pub use verifier::SpaceVerifier;

pub const PROVIDER_NAME: &str = "uaa";
pub const DISPLAY_NAME: &str = "UAA";

pub const SCOPES: &[&str] = &["cloud_controller.read"];
