//! Team-scoped provider resolution.

use crate::error::{AggregateError, IdentityError, IdentityResult};
use crate::provider::{Provider, ProviderConstructor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// A team as persisted by the surrounding service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub name: String,
    pub id: i64,
    #[serde(default)]
    pub admin: bool,
    /// Provider name to provider-specific configuration.
    #[serde(default)]
    pub providers: BTreeMap<String, serde_json::Value>,
}

/// The parts of a team that end up in a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamContext {
    pub name: String,
    pub id: i64,
    pub admin: bool,
}

impl From<&Team> for TeamContext {
    fn from(team: &Team) -> Self {
        Self {
            name: team.name.clone(),
            id: team.id,
            admin: team.admin,
        }
    }
}

/// Source of team records, usually backed by a database.
#[async_trait]
pub trait TeamSource: Send + Sync {
    async fn find_team(&self, name: &str) -> IdentityResult<Option<Team>>;
}

/// Fixed set of teams held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticTeams {
    teams: HashMap<String, Team>,
}

impl StaticTeams {
    pub fn new(teams: impl IntoIterator<Item = Team>) -> Self {
        Self {
            teams: teams
                .into_iter()
                .map(|team| (team.name.clone(), team))
                .collect(),
        }
    }
}

#[async_trait]
impl TeamSource for StaticTeams {
    async fn find_team(&self, name: &str) -> IdentityResult<Option<Team>> {
        Ok(self.teams.get(name).cloned())
    }
}

/// A provider built for a specific team.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub team: TeamContext,
    pub provider: Arc<dyn Provider>,
}

/// Maps provider names to constructors and resolves them per team.
///
/// Populated once through [`ProviderRegistryBuilder`] and read-only afterwards.
pub struct ProviderRegistry {
    constructors: HashMap<String, Arc<dyn ProviderConstructor>>,
    teams: Arc<dyn TeamSource>,
    external_url: String,
}

impl ProviderRegistry {
    pub fn builder(teams: Arc<dyn TeamSource>) -> ProviderRegistryBuilder {
        ProviderRegistryBuilder {
            constructors: HashMap::new(),
            teams,
            external_url: String::new(),
        }
    }

    pub fn is_registered(&self, provider_name: &str) -> bool {
        self.constructors.contains_key(provider_name)
    }

    /// Callback URL handed to the provider named `provider_name`.
    pub fn redirect_url(&self, provider_name: &str) -> String {
        format!(
            "{}/auth/{}/callback",
            self.external_url.trim_end_matches('/'),
            provider_name
        )
    }

    /// Resolve `provider_name` as configured for `team_name`.
    ///
    /// `Ok(None)` when the provider is unknown, the team does not exist, or the
    /// team has not configured that provider.
    pub async fn lookup(
        &self,
        team_name: &str,
        provider_name: &str,
    ) -> IdentityResult<Option<ResolvedProvider>> {
        let Some(constructor) = self.constructors.get(provider_name) else {
            debug!(provider = provider_name, "provider not registered");
            return Ok(None);
        };

        let Some(team) = self.teams.find_team(team_name).await? else {
            debug!(team = team_name, "team not found");
            return Ok(None);
        };

        let Some(config) = team.providers.get(provider_name) else {
            debug!(
                team = team_name,
                provider = provider_name,
                "provider not configured for team"
            );
            return Ok(None);
        };

        let provider = constructor.construct(config, &self.redirect_url(provider_name))?;

        Ok(Some(ResolvedProvider {
            team: TeamContext::from(&team),
            provider,
        }))
    }

    /// Validate every provider configuration of `team`, collecting all problems.
    pub fn validate_team(&self, team: &Team) -> IdentityResult<()> {
        let mut errors = AggregateError::new();

        for (provider_name, config) in &team.providers {
            match self.constructors.get(provider_name) {
                Some(constructor) => {
                    if let Err(err) = constructor.validate(config) {
                        errors.push(IdentityError::InvalidConfig(format!(
                            "team '{}', provider '{}': {}",
                            team.name, provider_name, err
                        )));
                    }
                }
                None => errors.push(IdentityError::ProviderNotFound(format!(
                    "team '{}' configures unknown provider '{}'",
                    team.name, provider_name
                ))),
            }
        }

        errors.into_result()
    }
}

pub struct ProviderRegistryBuilder {
    constructors: HashMap<String, Arc<dyn ProviderConstructor>>,
    teams: Arc<dyn TeamSource>,
    external_url: String,
}

impl ProviderRegistryBuilder {
    /// Base URL this service is reachable at; callback URLs are derived from it.
    pub fn external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = url.into();
        self
    }

    pub fn register(mut self, constructor: Arc<dyn ProviderConstructor>) -> Self {
        self.constructors
            .insert(constructor.name().to_string(), constructor);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            constructors: self.constructors,
            teams: self.teams,
            external_url: self.external_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{Credential, IdentityClient};

    struct StubProvider {
        redirect_url: String,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn display_name(&self) -> &str {
            "Stub"
        }

        fn auth_code_url(&self, state: &str) -> String {
            format!(
                "https://stub.example.com/auth?redirect_uri={}&state={state}",
                self.redirect_url
            )
        }

        async fn exchange(&self, code: &str) -> IdentityResult<Credential> {
            Ok(Credential::bearer(code))
        }

        fn client(&self, credential: Credential) -> IdentityClient {
            IdentityClient::new(reqwest::Client::new(), credential)
        }

        async fn verify(&self, _client: &IdentityClient) -> IdentityResult<bool> {
            Ok(true)
        }
    }

    struct StubConstructor;

    impl ProviderConstructor for StubConstructor {
        fn name(&self) -> &str {
            "stub"
        }

        fn validate(&self, config: &serde_json::Value) -> IdentityResult<()> {
            if config.get("client_id").is_some() {
                Ok(())
            } else {
                Err(IdentityError::InvalidConfig("missing client_id".to_string()))
            }
        }

        fn construct(
            &self,
            _config: &serde_json::Value,
            redirect_url: &str,
        ) -> IdentityResult<Arc<dyn Provider>> {
            Ok(Arc::new(StubProvider {
                redirect_url: redirect_url.to_string(),
            }))
        }
    }

    fn team(name: &str, id: i64, providers: &[&str]) -> Team {
        Team {
            name: name.to_string(),
            id,
            admin: name == "main",
            providers: providers
                .iter()
                .map(|p| (p.to_string(), serde_json::json!({"client_id": "abc"})))
                .collect(),
        }
    }

    fn registry() -> ProviderRegistry {
        let teams = StaticTeams::new(vec![
            team("main", 1, &["stub"]),
            team("other", 2, &[]),
        ]);
        ProviderRegistry::builder(Arc::new(teams))
            .external_url("https://ci.example.com/")
            .register(Arc::new(StubConstructor))
            .build()
    }

    #[tokio::test]
    async fn test_lookup_resolves_team_context() {
        let resolved = registry().lookup("main", "stub").await.unwrap().unwrap();
        assert_eq!(
            resolved.team,
            TeamContext {
                name: "main".to_string(),
                id: 1,
                admin: true
            }
        );
        assert_eq!(resolved.provider.name(), "stub");
    }

    #[tokio::test]
    async fn test_lookup_misses() {
        let registry = registry();
        assert!(registry.lookup("main", "bogus").await.unwrap().is_none());
        assert!(registry.lookup("nobody", "stub").await.unwrap().is_none());
        assert!(registry.lookup("other", "stub").await.unwrap().is_none());
    }

    #[test]
    fn test_redirect_url_is_derived_from_external_url() {
        assert_eq!(
            registry().redirect_url("stub"),
            "https://ci.example.com/auth/stub/callback"
        );
    }

    #[tokio::test]
    async fn test_constructed_provider_receives_redirect_url() {
        let resolved = registry().lookup("main", "stub").await.unwrap().unwrap();
        let url = resolved.provider.auth_code_url("xyz");
        assert!(url.contains("redirect_uri=https://ci.example.com/auth/stub/callback"));
        assert!(url.ends_with("state=xyz"));
    }

    #[test]
    fn test_validate_team_collects_every_problem() {
        let registry = registry();
        let mut broken = team("broken", 3, &[]);
        broken
            .providers
            .insert("stub".to_string(), serde_json::json!({}));
        broken
            .providers
            .insert("mystery".to_string(), serde_json::json!({}));

        let message = registry.validate_team(&broken).unwrap_err().to_string();
        assert!(message.contains("missing client_id"));
        assert!(message.contains("unknown provider 'mystery'"));

        assert!(registry.validate_team(&team("main", 1, &["stub"])).is_ok());
    }
}
