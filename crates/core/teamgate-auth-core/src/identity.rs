//! Per-request identity, built once by the propagation middleware.

use axum::extract::FromRequestParts;
use http::request::Parts;
use serde::Serialize;
use std::convert::Infallible;
use teamgate_session::SessionClaims;

/// Team information read from the caller's session.
///
/// `Absent` is distinct from a team with an empty name: an authenticated
/// request may carry no team claim at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TeamClaims {
    #[default]
    Absent,
    Present {
        team_name: String,
        team_id: i64,
        is_admin: bool,
    },
}

impl TeamClaims {
    pub fn team_name(&self) -> Option<&str> {
        match self {
            TeamClaims::Present { team_name, .. } => Some(team_name),
            TeamClaims::Absent => None,
        }
    }

    pub fn team_id(&self) -> Option<i64> {
        match self {
            TeamClaims::Present { team_id, .. } => Some(*team_id),
            TeamClaims::Absent => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, TeamClaims::Present { is_admin: true, .. })
    }

    pub fn is_present(&self) -> bool {
        matches!(self, TeamClaims::Present { .. })
    }
}

impl From<SessionClaims> for TeamClaims {
    fn from(claims: SessionClaims) -> Self {
        TeamClaims::Present {
            team_name: claims.team_name,
            team_id: claims.team_id,
            is_admin: claims.is_admin,
        }
    }
}

/// What the propagation stage learned about the caller.
///
/// Stored in the request extensions and extracted by handlers. A request that
/// never went through propagation extracts as unauthenticated with no team.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    pub authenticated: bool,
    pub team: TeamClaims,
}

impl RequestIdentity {
    pub fn new(authenticated: bool, team: TeamClaims) -> Self {
        Self {
            authenticated,
            team,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_parts(parts: &Parts) -> Self {
        parts
            .extensions
            .get::<RequestIdentity>()
            .cloned()
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestIdentity::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_claims_have_no_team() {
        let claims = TeamClaims::Absent;
        assert_eq!(claims.team_name(), None);
        assert_eq!(claims.team_id(), None);
        assert!(!claims.is_admin());
        assert!(!claims.is_present());
    }

    #[test]
    fn test_empty_team_name_is_still_present() {
        let claims = TeamClaims::Present {
            team_name: String::new(),
            team_id: 0,
            is_admin: false,
        };
        assert_eq!(claims.team_name(), Some(""));
        assert!(claims.is_present());
        assert_ne!(claims, TeamClaims::Absent);
    }

    #[test]
    fn test_from_session_claims() {
        let claims = TeamClaims::from(SessionClaims {
            team_name: "main".to_string(),
            team_id: 1,
            is_admin: true,
        });
        assert_eq!(claims.team_name(), Some("main"));
        assert_eq!(claims.team_id(), Some(1));
        assert!(claims.is_admin());
    }

    #[test]
    fn test_from_parts_defaults_to_anonymous() {
        let (parts, ()) = http::Request::new(()).into_parts();
        assert_eq!(RequestIdentity::from_parts(&parts), RequestIdentity::anonymous());
    }

    #[test]
    fn test_from_parts_reads_extension() {
        let identity = RequestIdentity::new(true, TeamClaims::Absent);
        let mut request = http::Request::new(());
        request.extensions_mut().insert(identity.clone());
        let (parts, ()) = request.into_parts();

        assert_eq!(RequestIdentity::from_parts(&parts), identity);
    }
}
