use super::client::GitHubClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use teamgate_identity_core::{IdentityClient, IdentityError, IdentityResult, Verifier};
use tracing::{error, info};

/// Accepts the listed GitHub users.
pub struct UserVerifier {
    users: Vec<String>,
    github: Arc<dyn GitHubClient>,
}

impl UserVerifier {
    pub fn new(users: Vec<String>, github: Arc<dyn GitHubClient>) -> Self {
        Self { users, github }
    }
}

#[async_trait]
impl Verifier for UserVerifier {
    async fn verify(&self, client: &IdentityClient) -> IdentityResult<bool> {
        let current_user = self.github.current_user(client).await.inspect_err(|err| {
            error!(error = %err, "failed to get current GitHub user");
        })?;

        if self.users.iter().any(|user| user == &current_user) {
            return Ok(true);
        }

        info!(have = %current_user, want = ?self.users, "not a permitted GitHub user");
        Ok(false)
    }
}

/// Accepts members of any of the listed organizations.
pub struct OrganizationVerifier {
    organizations: Vec<String>,
    github: Arc<dyn GitHubClient>,
}

impl OrganizationVerifier {
    pub fn new(organizations: Vec<String>, github: Arc<dyn GitHubClient>) -> Self {
        Self {
            organizations,
            github,
        }
    }
}

#[async_trait]
impl Verifier for OrganizationVerifier {
    async fn verify(&self, client: &IdentityClient) -> IdentityResult<bool> {
        let orgs = self.github.organizations(client).await.inspect_err(|err| {
            error!(error = %err, "failed to list GitHub organizations");
        })?;

        if orgs.iter().any(|org| self.organizations.contains(org)) {
            return Ok(true);
        }

        info!(have = ?orgs, want = ?self.organizations, "not in any permitted GitHub organization");
        Ok(false)
    }
}

/// A team inside a GitHub organization, written `organization/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GitHubTeam {
    pub organization: String,
    pub name: String,
}

impl FromStr for GitHubTeam {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((organization, name)) if !organization.is_empty() && !name.is_empty() => {
                Ok(Self {
                    organization: organization.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(IdentityError::InvalidConfig(format!(
                "GitHub team '{s}' must be written as ORG/TEAM"
            ))),
        }
    }
}

impl TryFrom<String> for GitHubTeam {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GitHubTeam> for String {
    fn from(team: GitHubTeam) -> Self {
        team.to_string()
    }
}

impl fmt::Display for GitHubTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.name)
    }
}

/// Accepts members of any of the listed teams.
pub struct TeamVerifier {
    teams: Vec<GitHubTeam>,
    github: Arc<dyn GitHubClient>,
}

impl TeamVerifier {
    pub fn new(teams: Vec<GitHubTeam>, github: Arc<dyn GitHubClient>) -> Self {
        Self { teams, github }
    }
}

#[async_trait]
impl Verifier for TeamVerifier {
    async fn verify(&self, client: &IdentityClient) -> IdentityResult<bool> {
        let user_teams = self.github.teams(client).await.inspect_err(|err| {
            error!(error = %err, "failed to list GitHub teams");
        })?;

        let member = self.teams.iter().any(|wanted| {
            user_teams
                .get(&wanted.organization)
                .is_some_and(|names| names.contains(&wanted.name))
        });
        if member {
            return Ok(true);
        }

        info!(have = ?user_teams, want = ?self.teams, "not in any permitted GitHub team");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::OrganizationTeams;
    use std::sync::Mutex;
    use teamgate_identity_core::Credential;

    #[derive(Default)]
    struct FakeGitHub {
        user: Mutex<Option<IdentityResult<String>>>,
        orgs: Mutex<Option<IdentityResult<Vec<String>>>>,
        teams: Mutex<Option<IdentityResult<OrganizationTeams>>>,
    }

    fn take<T>(slot: &Mutex<Option<IdentityResult<T>>>) -> IdentityResult<T> {
        slot.lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(IdentityError::ProviderError("unexpected call".into())))
    }

    #[async_trait]
    impl GitHubClient for FakeGitHub {
        async fn current_user(&self, _client: &IdentityClient) -> IdentityResult<String> {
            take(&self.user)
        }

        async fn organizations(&self, _client: &IdentityClient) -> IdentityResult<Vec<String>> {
            take(&self.orgs)
        }

        async fn teams(&self, _client: &IdentityClient) -> IdentityResult<OrganizationTeams> {
            take(&self.teams)
        }
    }

    fn client() -> IdentityClient {
        IdentityClient::new(reqwest::Client::new(), Credential::bearer("gh-token"))
    }

    fn github_returning_user(result: IdentityResult<String>) -> Arc<FakeGitHub> {
        let fake = FakeGitHub::default();
        *fake.user.lock().unwrap() = Some(result);
        Arc::new(fake)
    }

    fn users() -> Vec<String> {
        vec!["some-user".to_string(), "some-other-user".to_string()]
    }

    #[tokio::test]
    async fn test_user_verifier_accepts_listed_user() {
        let verifier = UserVerifier::new(users(), github_returning_user(Ok("some-user".into())));
        assert!(verifier.verify(&client()).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_verifier_rejects_other_users() {
        let verifier = UserVerifier::new(users(), github_returning_user(Ok("stranger".into())));
        assert!(!verifier.verify(&client()).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_verifier_returns_client_errors() {
        let github = github_returning_user(Err(IdentityError::ProviderError("nope".into())));
        let err = UserVerifier::new(users(), github)
            .verify(&client())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Provider error: nope");
    }

    #[tokio::test]
    async fn test_organization_verifier() {
        let fake = FakeGitHub::default();
        *fake.orgs.lock().unwrap() = Some(Ok(vec!["other-org".into(), "some-org".into()]));
        let verifier = OrganizationVerifier::new(vec!["some-org".into()], Arc::new(fake));
        assert!(verifier.verify(&client()).await.unwrap());

        let fake = FakeGitHub::default();
        *fake.orgs.lock().unwrap() = Some(Ok(vec!["other-org".into()]));
        let verifier = OrganizationVerifier::new(vec!["some-org".into()], Arc::new(fake));
        assert!(!verifier.verify(&client()).await.unwrap());
    }

    fn wanted_teams() -> Vec<GitHubTeam> {
        vec![
            "some-org/some-team".parse().unwrap(),
            "some-org/some-team-two".parse().unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_team_verifier_accepts_member_of_desired_team() {
        let fake = FakeGitHub::default();
        *fake.teams.lock().unwrap() = Some(Ok(OrganizationTeams::from([
            ("some-other-org".to_string(), vec!["some-other-team".to_string()]),
            ("some-org".to_string(), vec!["some-team".to_string()]),
        ])));

        let verifier = TeamVerifier::new(wanted_teams(), Arc::new(fake));
        assert!(verifier.verify(&client()).await.unwrap());
    }

    #[tokio::test]
    async fn test_team_verifier_requires_matching_organization() {
        let fake = FakeGitHub::default();
        *fake.teams.lock().unwrap() = Some(Ok(OrganizationTeams::from([(
            "some-other-org".to_string(),
            vec!["some-team".to_string()],
        )])));

        let verifier = TeamVerifier::new(wanted_teams(), Arc::new(fake));
        assert!(!verifier.verify(&client()).await.unwrap());
    }

    #[test]
    fn test_team_parsing() {
        let team: GitHubTeam = "some-org/some-team".parse().unwrap();
        assert_eq!(team.organization, "some-org");
        assert_eq!(team.name, "some-team");
        assert_eq!(team.to_string(), "some-org/some-team");

        assert!("no-slash".parse::<GitHubTeam>().is_err());
        assert!("/team".parse::<GitHubTeam>().is_err());
        assert!(serde_json::from_value::<GitHubTeam>(serde_json::json!("org/")).is_err());
    }
}
