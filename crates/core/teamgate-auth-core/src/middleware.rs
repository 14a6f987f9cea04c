//! Identity propagation and team authorization middleware.

use crate::error::{AuthError, AuthResult};
use crate::identity::{RequestIdentity, TeamClaims};
use crate::reader::UserContextReader;
use crate::rejector::Rejector;
use crate::validator::Validator;
use axum::extract::{RawPathParams, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, StatusCode};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Path parameter naming the team a protected route belongs to.
pub const TEAM_NAME_PARAM: &str = "team_name";

/// State for [`propagate_identity`].
#[derive(Clone)]
pub struct IdentityPropagation {
    validator: Arc<dyn Validator>,
    reader: Arc<dyn UserContextReader>,
}

impl IdentityPropagation {
    pub fn new(validator: Arc<dyn Validator>, reader: Arc<dyn UserContextReader>) -> Self {
        Self { validator, reader }
    }

    pub fn identify(&self, headers: &HeaderMap) -> RequestIdentity {
        RequestIdentity::new(
            self.validator.is_authenticated(headers),
            self.reader.get_team(headers),
        )
    }
}

/// Attach a [`RequestIdentity`] to every request before it reaches a handler.
///
/// ```ignore
/// router.layer(middleware::from_fn_with_state(propagation, propagate_identity))
/// ```
pub async fn propagate_identity(
    State(propagation): State<IdentityPropagation>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = propagation.identify(request.headers());
    debug!(
        authenticated = identity.authenticated,
        team = identity.team.team_name(),
        "request identity resolved"
    );
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// How team access is decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    /// Team that exists before any other team does.
    pub default_team: String,
    /// Let authenticated callers without a team claim into the default team.
    pub allow_default_team_fallback: bool,
    /// Let sessions of admin teams into any team.
    pub admin_override: bool,
}

impl AuthorizationPolicy {
    pub fn new(default_team: impl Into<String>) -> Self {
        Self {
            default_team: default_team.into(),
            ..Self::default()
        }
    }
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self {
            default_team: "main".to_string(),
            allow_default_team_fallback: true,
            admin_override: false,
        }
    }
}

/// Decide whether `identity` may act on `requested_team`.
pub fn authorize(
    identity: &RequestIdentity,
    requested_team: &str,
    policy: &AuthorizationPolicy,
) -> AuthResult {
    if !identity.authenticated {
        return Err(AuthError::AuthenticationRequired);
    }

    match &identity.team {
        TeamClaims::Absent
            if policy.allow_default_team_fallback && requested_team == policy.default_team =>
        {
            Ok(())
        }
        TeamClaims::Present { team_name, .. } if team_name == requested_team => Ok(()),
        TeamClaims::Present { is_admin: true, .. } if policy.admin_override => Ok(()),
        claims => Err(AuthError::Forbidden {
            requested: requested_team.to_string(),
            actual: claims.team_name().map(str::to_string),
        }),
    }
}

/// State for [`check_authorization`].
#[derive(Clone)]
pub struct TeamAuthorization {
    policy: Arc<AuthorizationPolicy>,
    rejector: Arc<dyn Rejector>,
}

impl TeamAuthorization {
    pub fn new(policy: AuthorizationPolicy, rejector: Arc<dyn Rejector>) -> Self {
        Self {
            policy: Arc::new(policy),
            rejector,
        }
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }
}

/// Guard a route with a `{team_name}` segment.
///
/// Must be installed with `route_layer` so the path parameters are known, and
/// beneath [`propagate_identity`].
#[instrument(name = "check_authorization", skip_all, fields(team = tracing::field::Empty))]
pub async fn check_authorization(
    State(authorization): State<TeamAuthorization>,
    params: RawPathParams,
    identity: RequestIdentity,
    request: Request,
    next: Next,
) -> Response {
    let Some(requested_team) = params
        .iter()
        .find(|(name, _)| *name == TEAM_NAME_PARAM)
        .map(|(_, value)| value.to_string())
    else {
        error!(
            path = %request.uri().path(),
            "route guarded by check_authorization has no team_name parameter"
        );
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    tracing::Span::current().record("team", requested_team.as_str());

    match authorize(&identity, &requested_team, &authorization.policy) {
        Ok(()) => next.run(request).await,
        Err(AuthError::AuthenticationRequired) => {
            warn!("rejecting unauthenticated request");
            authorization.rejector.unauthorized()
        }
        Err(AuthError::Forbidden { requested, actual }) => {
            warn!(
                expected_team = %requested,
                actual_team = actual.as_deref().unwrap_or("<none>"),
                "rejecting request for another team"
            );
            authorization.rejector.forbidden()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present(team: &str, is_admin: bool) -> RequestIdentity {
        RequestIdentity::new(
            true,
            TeamClaims::Present {
                team_name: team.to_string(),
                team_id: 7,
                is_admin,
            },
        )
    }

    #[test]
    fn test_unauthenticated_is_rejected_regardless_of_claims() {
        let policy = AuthorizationPolicy::default();
        let mut identity = present("some-team", true);
        identity.authenticated = false;

        assert_eq!(
            authorize(&identity, "some-team", &policy),
            Err(AuthError::AuthenticationRequired)
        );
        assert_eq!(
            authorize(&RequestIdentity::anonymous(), "main", &policy),
            Err(AuthError::AuthenticationRequired)
        );
    }

    #[test]
    fn test_matching_team_is_allowed() {
        let policy = AuthorizationPolicy::default();
        assert_eq!(authorize(&present("some-team", false), "some-team", &policy), Ok(()));
    }

    #[test]
    fn test_other_team_is_forbidden() {
        let policy = AuthorizationPolicy::default();
        assert_eq!(
            authorize(&present("another-team", false), "some-team", &policy),
            Err(AuthError::Forbidden {
                requested: "some-team".to_string(),
                actual: Some("another-team".to_string()),
            })
        );
    }

    #[test]
    fn test_default_team_fallback() {
        let identity = RequestIdentity::new(true, TeamClaims::Absent);
        let policy = AuthorizationPolicy::default();

        assert_eq!(authorize(&identity, "main", &policy), Ok(()));
        assert!(authorize(&identity, "some-team", &policy).is_err());

        let strict = AuthorizationPolicy {
            allow_default_team_fallback: false,
            ..AuthorizationPolicy::default()
        };
        assert_eq!(
            authorize(&identity, "main", &strict),
            Err(AuthError::Forbidden {
                requested: "main".to_string(),
                actual: None,
            })
        );
    }

    #[test]
    fn test_fallback_does_not_apply_to_empty_team_claim() {
        let policy = AuthorizationPolicy::default();
        let identity = present("", false);
        assert_eq!(
            authorize(&identity, "main", &policy),
            Err(AuthError::Forbidden {
                requested: "main".to_string(),
                actual: Some(String::new()),
            })
        );
    }

    #[test]
    fn test_admin_override_is_opt_in() {
        let admin = present("main", true);
        assert!(authorize(&admin, "some-team", &AuthorizationPolicy::default()).is_err());

        let policy = AuthorizationPolicy {
            admin_override: true,
            ..AuthorizationPolicy::default()
        };
        assert_eq!(authorize(&admin, "some-team", &policy), Ok(()));
        assert!(authorize(&present("main", false), "some-team", &policy).is_err());
    }
}
