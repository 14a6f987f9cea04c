use async_trait::async_trait;
use reqwest::header::{ACCEPT, LINK};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use teamgate_identity_core::{IdentityClient, IdentityError, IdentityResult};
use tracing::debug;
use url::Url;

/// Organization login to the names of the caller's teams in it.
pub type OrganizationTeams = HashMap<String, Vec<String>>;

/// The GitHub API calls membership checks need, made as the logged-in user.
#[async_trait]
pub trait GitHubClient: Send + Sync {
    async fn current_user(&self, client: &IdentityClient) -> IdentityResult<String>;
    async fn organizations(&self, client: &IdentityClient) -> IdentityResult<Vec<String>>;
    async fn teams(&self, client: &IdentityClient) -> IdentityResult<OrganizationTeams>;
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

#[derive(Debug, Deserialize)]
struct TeamInfo {
    name: String,
    organization: Account,
}

/// [`GitHubClient`] talking to the REST API at `api_url`.
#[derive(Debug, Clone)]
pub struct GitHubApiClient {
    api_url: Url,
}

impl GitHubApiClient {
    pub fn new(api_url: &str) -> IdentityResult<Self> {
        let mut api_url = Url::parse(api_url).map_err(|e| {
            IdentityError::InvalidConfig(format!("invalid GitHub API URL '{api_url}': {e}"))
        })?;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }
        Ok(Self { api_url })
    }

    fn endpoint(&self, path: &str) -> IdentityResult<Url> {
        let mut url = self.api_url.join(path).map_err(|e| {
            IdentityError::InvalidConfig(format!("invalid GitHub API path '{path}': {e}"))
        })?;
        url.query_pairs_mut().append_pair("per_page", "100");
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        client: &IdentityClient,
        url: Url,
    ) -> IdentityResult<(T, Option<Url>)> {
        let response = client
            .get(url.clone())
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(next_page);

        Ok((response.json().await?, next))
    }

    /// Every page of a list endpoint, following `Link: rel="next"`.
    async fn get_all<T: DeserializeOwned>(
        &self,
        client: &IdentityClient,
        path: &str,
    ) -> IdentityResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(self.endpoint(path)?);

        while let Some(url) = next {
            let (page, following): (Vec<T>, _) = self.get_json(client, url).await?;
            items.extend(page);
            next = following;
        }

        Ok(items)
    }
}

fn next_page(link_header: &str) -> Option<Url> {
    link_header.split(',').find_map(|link| {
        let (target, params) = link.trim().split_once(';')?;
        params
            .split(';')
            .any(|param| param.trim() == r#"rel="next""#)
            .then(|| target.trim().trim_start_matches('<').trim_end_matches('>'))
            .and_then(|target| Url::parse(target).ok())
    })
}

#[async_trait]
impl GitHubClient for GitHubApiClient {
    async fn current_user(&self, client: &IdentityClient) -> IdentityResult<String> {
        let url = self.api_url.join("user").map_err(|e| {
            IdentityError::InvalidConfig(format!("invalid GitHub API URL: {e}"))
        })?;
        let (user, _): (Account, _) = self.get_json(client, url).await?;
        Ok(user.login)
    }

    async fn organizations(&self, client: &IdentityClient) -> IdentityResult<Vec<String>> {
        let orgs: Vec<Account> = self.get_all(client, "user/orgs").await?;
        debug!(count = orgs.len(), "fetched GitHub organizations");
        Ok(orgs.into_iter().map(|org| org.login).collect())
    }

    async fn teams(&self, client: &IdentityClient) -> IdentityResult<OrganizationTeams> {
        let teams: Vec<TeamInfo> = self.get_all(client, "user/teams").await?;

        let mut by_org = OrganizationTeams::new();
        for team in teams {
            by_org
                .entry(team.organization.login)
                .or_default()
                .push(team.name);
        }
        Ok(by_org)
    }
}
