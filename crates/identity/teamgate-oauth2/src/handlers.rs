//! OAuth begin and callback endpoints.

use crate::state::{CsrfState, states_match};
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::{DateTime, Duration, Utc};
use http::header::{LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use teamgate_identity_core::{IdentityError, ProviderRegistry, ResolvedProvider};
use teamgate_session::{
    SESSION_COOKIE_NAME, STATE_COOKIE_NAME, SessionClaims, TokenCodec, bearer_value, read_cookie,
    set_cookie,
};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Session lifetime in seconds when none is configured.
pub const DEFAULT_COOKIE_AGE_SECS: i64 = 86_400;

/// Shared, read-only state of the OAuth endpoints.
#[derive(Clone)]
pub struct OAuthHandlerState {
    registry: Arc<ProviderRegistry>,
    codec: Arc<TokenCodec>,
    cookie_age: Duration,
    default_team: String,
}

impl OAuthHandlerState {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        codec: Arc<TokenCodec>,
        default_team: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            codec,
            cookie_age: Duration::seconds(DEFAULT_COOKIE_AGE_SECS),
            default_team: default_team.into(),
        }
    }

    pub fn with_cookie_age(mut self, cookie_age: Duration) -> Self {
        self.cookie_age = cookie_age;
        self
    }

    /// Expiry of a cookie issued now.
    fn expires_at(&self) -> Result<DateTime<Utc>, OAuthError> {
        Utc::now().checked_add_signed(self.cookie_age).ok_or_else(|| {
            error!(cookie_age = %self.cookie_age, "cookie expiry out of range");
            OAuthError::Internal
        })
    }

    async fn resolve(
        &self,
        team_name: &str,
        provider_name: &str,
    ) -> Result<ResolvedProvider, OAuthError> {
        match self.registry.lookup(team_name, provider_name).await {
            Ok(Some(resolved)) => Ok(resolved),
            Ok(None) => {
                info!(team = team_name, provider = provider_name, "unknown provider for team");
                Err(OAuthError::NotFound)
            }
            Err(err) => {
                error!(
                    team = team_name,
                    provider = provider_name,
                    error = %err,
                    "failed to resolve provider"
                );
                Err(OAuthError::Internal)
            }
        }
    }
}

/// `GET /auth/{provider}` and `GET /auth/{provider}/callback`.
pub fn oauth_routes(state: OAuthHandlerState) -> Router {
    Router::new()
        .route("/auth/{provider}", get(oauth_begin))
        .route("/auth/{provider}/callback", get(oauth_callback))
        .with_state(state)
}

/// Failures of the OAuth endpoints. Details are logged where they occur;
/// responses only carry a generic message.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("unknown provider")]
    NotFound,
    #[error("invalid OAuth state")]
    BadCsrf,
    #[error("code exchange failed: {0}")]
    ExchangeFailed(IdentityError),
    #[error("identity not permitted")]
    VerifyDenied,
    #[error("identity verification failed: {0}")]
    VerifyFailed(IdentityError),
    #[error("internal error")]
    Internal,
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            OAuthError::NotFound => (StatusCode::NOT_FOUND, "not found\n"),
            OAuthError::BadCsrf | OAuthError::VerifyDenied => {
                (StatusCode::UNAUTHORIZED, "not authorized\n")
            }
            OAuthError::ExchangeFailed(_) | OAuthError::VerifyFailed(_) | OAuthError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error\n")
            }
        };

        (status, message).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BeginParams {
    #[serde(default)]
    pub redirect: String,
    pub team_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Post-login redirects stay on this service.
fn is_local_path(redirect: &str) -> bool {
    redirect.starts_with('/') && !redirect.starts_with("//") && !redirect.starts_with("/\\")
}

fn header_value(
    value: Result<HeaderValue, http::header::InvalidHeaderValue>,
) -> Result<HeaderValue, OAuthError> {
    value.map_err(|err| {
        error!(error = %err, "failed to build header");
        OAuthError::Internal
    })
}

#[instrument(name = "oauth_begin", skip_all, fields(provider = %provider_name))]
pub async fn oauth_begin(
    State(state): State<OAuthHandlerState>,
    Path(provider_name): Path<String>,
    Query(params): Query<BeginParams>,
) -> Result<Response, OAuthError> {
    let team_name = params
        .team_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| state.default_team.clone());

    let resolved = state.resolve(&team_name, &provider_name).await?;

    let redirect = if params.redirect.is_empty() || is_local_path(&params.redirect) {
        params.redirect
    } else {
        warn!(redirect = %params.redirect, "ignoring non-local redirect");
        String::new()
    };

    let encoded_state = CsrfState::new(redirect, team_name.as_str())
        .encode()
        .map_err(|err| {
            error!(error = %err, "failed to marshal state");
            OAuthError::Internal
        })?;

    let cookie = header_value(set_cookie(
        STATE_COOKIE_NAME,
        &encoded_state,
        state.expires_at()?,
    ))?;
    let location = header_value(HeaderValue::from_str(
        &resolved.provider.auth_code_url(&encoded_state),
    ))?;

    debug!(team = %team_name, "redirecting to provider");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    headers.insert(LOCATION, location);
    Ok((StatusCode::TEMPORARY_REDIRECT, headers).into_response())
}

#[instrument(name = "oauth_callback", skip_all, fields(provider = %provider_name, team = tracing::field::Empty))]
pub async fn oauth_callback(
    State(state): State<OAuthHandlerState>,
    Path(provider_name): Path<String>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Response, OAuthError> {
    if !state.registry.is_registered(&provider_name) {
        info!("unknown provider");
        return Err(OAuthError::NotFound);
    }

    let query_state = params.state.unwrap_or_default();
    let cookie_state = read_cookie(&headers, STATE_COOKIE_NAME).unwrap_or_default();
    if query_state.is_empty() || !states_match(&cookie_state, &query_state) {
        info!(
            has_cookie = !cookie_state.is_empty(),
            has_query = !query_state.is_empty(),
            "oauth state mismatch"
        );
        return Err(OAuthError::BadCsrf);
    }

    let csrf_state = CsrfState::decode(&query_state).map_err(|err| {
        info!(error = %err, "failed to decode oauth state");
        OAuthError::BadCsrf
    })?;
    tracing::Span::current().record("team", csrf_state.team_name.as_str());

    let ResolvedProvider { team, provider } =
        state.resolve(&csrf_state.team_name, &provider_name).await?;

    let credential = provider
        .exchange(&params.code.unwrap_or_default())
        .await
        .map_err(|err| {
            error!(error = %err, "failed to exchange code");
            OAuthError::ExchangeFailed(err)
        })?;

    let client = provider.client(credential);
    match provider.verify(&client).await {
        Ok(true) => {}
        Ok(false) => {
            info!("identity not permitted for team");
            return Err(OAuthError::VerifyDenied);
        }
        Err(err) => {
            error!(error = %err, "failed to verify identity");
            return Err(OAuthError::VerifyFailed(err));
        }
    }

    let expires_at = state.expires_at()?;
    let claims = SessionClaims {
        team_name: team.name,
        team_id: team.id,
        is_admin: team.admin,
    };
    let token = state.codec.sign(&claims, expires_at).map_err(|err| {
        error!(error = %err, "failed to sign session token");
        OAuthError::Internal
    })?;

    let session = bearer_value(&token);
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        SET_COOKIE,
        header_value(set_cookie(SESSION_COOKIE_NAME, &session, expires_at))?,
    );

    info!(is_admin = claims.is_admin, "session issued");

    let redirect = csrf_state.redirect;
    if redirect.is_empty() || !is_local_path(&redirect) {
        if !redirect.is_empty() {
            warn!(redirect = %redirect, "ignoring non-local redirect in state");
        }
        return Ok((StatusCode::OK, response_headers, format!("{session}\n")).into_response());
    }

    response_headers.insert(LOCATION, header_value(HeaderValue::from_str(&redirect))?);
    Ok((StatusCode::TEMPORARY_REDIRECT, response_headers).into_response())
}
