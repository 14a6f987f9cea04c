//! The teamgate HTTP service: OAuth login issuing team-scoped session
//! tokens, and team-guarded API routes accepting them.

pub mod cli;
pub mod config;
pub mod telemetry;


use anyhow::{Context, Result};
use axum::extract::Path as UrlPath;
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use teamgate_auth_core::{
    AuthorizationPolicy, BasicAuthValidator, DefaultRejector, IdentityPropagation, JwtReader,
    JwtValidator, NoAuthValidator, RequestIdentity, TeamAuthorization, Validator, ValidatorBasket,
    check_authorization, propagate_identity,
};
use teamgate_identity_core::{AggregateError, ProviderRegistry, StaticTeams};
use teamgate_oauth2::cf::CfProviderConstructor;
use teamgate_oauth2::github::GitHubProviderConstructor;
use teamgate_oauth2::uaa::UaaProviderConstructor;
use teamgate_oauth2::{OAuthHandlerState, oauth_routes};
use teamgate_session::TokenCodec;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;

const USER_AGENT: &str = concat!("teamgate/", env!("CARGO_PKG_VERSION"));
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Read the PEM encoded RSA signing key at `path`.
pub fn load_signing_key(path: &Path) -> Result<TokenCodec> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read signing key {}", path.display()))?;

    TokenCodec::from_rsa_pem(&pem)
        .with_context(|| format!("Failed to load signing key {}", path.display()))
}

/// Registry with every supported provider, resolving teams from `config`.
pub fn build_registry(config: &Config) -> Result<ProviderRegistry> {
    let http_client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let teams = StaticTeams::new(config.teams.iter().cloned());

    Ok(ProviderRegistry::builder(Arc::new(teams))
        .external_url(config.auth.external_url.as_str())
        .register(Arc::new(GitHubProviderConstructor::new(http_client.clone())))
        .register(Arc::new(UaaProviderConstructor::new(http_client.clone())))
        .register(Arc::new(CfProviderConstructor::new(http_client)))
        .build())
}

/// Check every team's provider configuration, reporting all problems together.
pub fn validate_teams(config: &Config, registry: &ProviderRegistry) -> Result<()> {
    let mut errors = AggregateError::new();
    for team in &config.teams {
        if let Err(err) = registry.validate_team(team) {
            errors.push(err);
        }
    }
    errors
        .into_result()
        .context("Invalid team provider configuration")?;

    if !config.teams.is_empty()
        && !config
            .teams
            .iter()
            .any(|team| team.name == config.auth.default_team)
    {
        warn!(
            default_team = %config.auth.default_team,
            "default team is not configured, logins without team_name will fail"
        );
    }

    Ok(())
}

fn validator(config: &Config, codec: Arc<TokenCodec>) -> Arc<dyn Validator> {
    let mut basket = ValidatorBasket::default().with(Arc::new(JwtValidator::new(codec)));

    if let Some(basic) = &config.auth.basic_auth {
        info!(username = %basic.username, "accepting basic auth");
        basket = basket.with(Arc::new(BasicAuthValidator::new(
            basic.username.as_str(),
            basic.password.as_str(),
        )));
    }

    if config.auth.no_auth {
        warn!("authentication disabled, every request is treated as authenticated");
        basket = basket.with(Arc::new(NoAuthValidator));
    }

    Arc::new(basket)
}

fn policy(config: &Config) -> AuthorizationPolicy {
    AuthorizationPolicy {
        default_team: config.auth.default_team.clone(),
        allow_default_team_fallback: config.auth.allow_default_team_fallback,
        admin_override: config.auth.admin_override,
    }
}

/// Assemble the service's routes.
pub fn build_router(config: &Config, codec: Arc<TokenCodec>) -> Result<Router> {
    let registry = build_registry(config)?;
    validate_teams(config, &registry)?;

    let cookie_age = chrono::TimeDelta::try_seconds(config.auth.cookie_age_seconds)
        .with_context(|| {
            format!(
                "auth.cookie_age_seconds {} is out of range",
                config.auth.cookie_age_seconds
            )
        })?;

    let oauth_state = OAuthHandlerState::new(
        Arc::new(registry),
        codec.clone(),
        config.auth.default_team.as_str(),
    )
    .with_cookie_age(cookie_age);

    let propagation = IdentityPropagation::new(
        validator(config, codec.clone()),
        Arc::new(JwtReader::new(codec)),
    );
    let authorization = TeamAuthorization::new(policy(config), Arc::new(DefaultRejector));

    let team_routes = Router::new()
        .route("/api/v1/teams/{team_name}/whoami", get(whoami))
        .route_layer(middleware::from_fn_with_state(
            authorization,
            check_authorization,
        ));

    Ok(Router::new()
        .route("/health", get(health))
        .merge(team_routes)
        .merge(oauth_routes(oauth_state))
        .layer(middleware::from_fn_with_state(
            propagation,
            propagate_identity,
        ))
        .layer(TraceLayer::new_for_http()))
}

async fn health() -> &'static str {
    "ok"
}

/// What the caller's session says about them. Every claim field is null
/// when the session carries no team.
#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub requested_team: String,
    pub team_name: Option<String>,
    pub team_id: Option<i64>,
    pub is_admin: Option<bool>,
}

async fn whoami(UrlPath(team_name): UrlPath<String>, identity: RequestIdentity) -> Json<WhoAmI> {
    Json(WhoAmI {
        requested_team: team_name,
        team_name: identity.team.team_name().map(str::to_string),
        team_id: identity.team.team_id(),
        is_admin: identity
            .team
            .is_present()
            .then(|| identity.team.is_admin()),
    })
}
