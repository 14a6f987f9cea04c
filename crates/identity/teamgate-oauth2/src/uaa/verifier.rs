use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use teamgate_identity_core::{IdentityClient, IdentityError, IdentityResult, Verifier};
use tracing::info;
use url::Url;

#[derive(Debug, Deserialize)]
struct UaaToken {
    #[serde(rename = "user_id", alias = "user-id")]
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct SpaceDevelopers {
    #[serde(default)]
    resources: Vec<SpaceUser>,
}

#[derive(Debug, Deserialize)]
struct SpaceUser {
    metadata: SpaceUserMetadata,
}

#[derive(Debug, Deserialize)]
struct SpaceUserMetadata {
    guid: String,
}

/// Accepts developers of any of the listed Cloud Foundry spaces.
#[derive(Debug, Clone)]
pub struct SpaceVerifier {
    space_guids: Vec<String>,
    cf_api_url: Url,
}

impl SpaceVerifier {
    pub fn new(space_guids: Vec<String>, cf_api_url: &str) -> IdentityResult<Self> {
        let cf_api_url = Url::parse(cf_api_url).map_err(|e| {
            IdentityError::InvalidConfig(format!("invalid CF API URL '{cf_api_url}': {e}"))
        })?;
        Ok(Self {
            space_guids,
            cf_api_url,
        })
    }

    /// The UAA user id carried in the access token.
    ///
    /// The token came straight from the token endpoint over TLS, so its
    /// signature is not checked here.
    fn user_id(access_token: &str) -> IdentityResult<String> {
        let mut segments = access_token.split('.');
        let payload = match (segments.next(), segments.next()) {
            (Some(_), Some(payload)) => payload,
            _ => {
                return Err(IdentityError::InvalidCredential(
                    "access token contains an invalid number of segments".to_string(),
                ));
            }
        };

        let decoded = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| IdentityError::InvalidCredential(format!("access token payload: {e}")))?;
        let token: UaaToken = serde_json::from_slice(&decoded)?;
        Ok(token.user_id)
    }

    fn developers_url(&self, space_guid: &str) -> Url {
        let mut url = self.cf_api_url.clone();
        url.set_path(&format!("/v2/spaces/{space_guid}/developers"));
        url
    }
}

#[async_trait]
impl Verifier for SpaceVerifier {
    async fn verify(&self, client: &IdentityClient) -> IdentityResult<bool> {
        let user_id = Self::user_id(&client.credential().access_token)?;

        for space_guid in &self.space_guids {
            let url = self.developers_url(space_guid);
            let response = client.get(url.clone()).send().await?;

            if response.status() != reqwest::StatusCode::OK {
                return Err(IdentityError::UnexpectedStatus {
                    status: response.status().as_u16(),
                    url: url.to_string(),
                });
            }

            let developers: SpaceDevelopers = response.json().await?;
            if developers
                .resources
                .iter()
                .any(|user| user.metadata.guid == user_id)
            {
                return Ok(true);
            }
        }

        info!(want = ?self.space_guids, "not a developer in any permitted space");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamgate_identity_core::Credential;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn access_token(claims: serde_json::Value) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    fn client_for(user_id: &str) -> IdentityClient {
        let token = access_token(serde_json::json!({
            "user_id": user_id,
            "scope": ["cloud_controller.read"]
        }));
        IdentityClient::new(reqwest::Client::new(), Credential::bearer(token))
    }

    fn developers(guids: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "resources": guids
                .iter()
                .map(|guid| serde_json::json!({"metadata": {"guid": guid}}))
                .collect::<Vec<_>>()
        })
    }

    #[test]
    fn test_user_id_accepts_both_claim_spellings() {
        let token = access_token(serde_json::json!({"user-id": "abc"}));
        assert_eq!(SpaceVerifier::user_id(&token).unwrap(), "abc");
        assert!(matches!(
            SpaceVerifier::user_id("no-dots"),
            Err(IdentityError::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn test_developer_of_second_space_is_verified() {
        let client = client_for("user-guid");
        let bearer = format!("Bearer {}", client.credential().access_token);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/spaces/space-1/developers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(developers(&["someone-else"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/spaces/space-2/developers"))
            .and(header("Authorization", bearer.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(developers(&["user-guid"])))
            .mount(&server)
            .await;

        let verifier =
            SpaceVerifier::new(vec!["space-1".into(), "space-2".into()], &server.uri()).unwrap();
        assert!(verifier.verify(&client).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_developer_is_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/spaces/space-1/developers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(developers(&["someone-else"])))
            .mount(&server)
            .await;

        let verifier = SpaceVerifier::new(vec!["space-1".into()], &server.uri()).unwrap();
        assert!(!verifier.verify(&client_for("user-guid")).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_ok_response_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/spaces/space-1/developers"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let verifier =
            SpaceVerifier::new(vec!["space-1".into(), "space-2".into()], &server.uri()).unwrap();
        let err = verifier.verify(&client_for("user-guid")).await.unwrap_err();
        assert!(matches!(err, IdentityError::UnexpectedStatus { status: 403, .. }));
    }
}
