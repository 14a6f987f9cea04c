//! Authentication and team authorization for axum services.
//!
//! [`propagate_identity`] runs once per request, asking a [`Validator`] whether
//! the caller is authenticated and a [`UserContextReader`] which team the
//! caller's session belongs to. The resulting [`RequestIdentity`] travels in
//! the request extensions. [`check_authorization`] guards routes carrying a
//! `{team_name}` segment and rejects through a pluggable [`Rejector`].

mod error;
mod identity;
mod middleware;
mod reader;
mod rejector;
mod validator;


pub use error::{AuthError, AuthResult};
pub use identity::{RequestIdentity, TeamClaims};
pub use middleware::{
    AuthorizationPolicy, IdentityPropagation, TEAM_NAME_PARAM, TeamAuthorization, authorize,
    check_authorization, propagate_identity,
};
pub use reader::{JwtReader, UserContextReader};
pub use rejector::{DefaultRejector, Rejector};
pub use validator::{BasicAuthValidator, JwtValidator, NoAuthValidator, Validator, ValidatorBasket};
