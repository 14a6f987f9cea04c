//! Signing and verification of session tokens.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token expired")]
    Expired,

    #[error("Unexpected signing algorithm: {0:?}")]
    UnexpectedAlgorithm(Algorithm),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("JWT error: {0}")]
    Jwt(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => TokenError::MalformedToken,
            ErrorKind::InvalidRsaKey(msg) => TokenError::InvalidKey(msg.clone()),
            ErrorKind::InvalidKeyFormat => TokenError::InvalidKey("invalid key format".to_string()),
            _ => TokenError::Jwt(err),
        }
    }
}

/// What a session token asserts about its bearer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "teamName")]
    pub team_name: String,
    #[serde(rename = "teamID")]
    pub team_id: i64,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

/// Claims of a token whose signature and expiry have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct TokenClaims {
    #[serde(flatten)]
    session: SessionClaims,
    exp: i64,
}

/// Signs and verifies session tokens with one process-wide RSA key pair.
///
/// Only tokens signed with the configured RSA algorithm are ever considered;
/// the header's `alg` is checked before any key material is used.
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from a PKCS#1 or PKCS#8 PEM private key, deriving the public half.
    pub fn from_rsa_pem(private_pem: &str) -> Result<Self, TokenError> {
        let public_pem = public_pem_from_private(private_pem)?;
        Self::from_rsa_pem_pair(private_pem, &public_pem)
    }

    pub fn from_rsa_pem_pair(private_pem: &str, public_pem: &str) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())?;
        Ok(Self::with_keys(Algorithm::RS256, encoding_key, decoding_key))
    }

    /// Switch to another RSA algorithm (RS384, RS512, PS256...).
    pub fn with_algorithm(self, algorithm: Algorithm) -> Result<Self, TokenError> {
        if !is_rsa_family(algorithm) {
            return Err(TokenError::UnexpectedAlgorithm(algorithm));
        }
        Ok(Self::with_keys(
            algorithm,
            self.encoding_key,
            self.decoding_key,
        ))
    }

    fn with_keys(algorithm: Algorithm, encoding_key: EncodingKey, decoding_key: DecodingKey) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign `claims` with an `exp` of `expires_at` (whole seconds).
    pub fn sign(
        &self,
        claims: &SessionClaims,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let token_claims = TokenClaims {
            session: claims.clone(),
            exp: expires_at.timestamp(),
        };

        Ok(encode(
            &Header::new(self.algorithm),
            &token_claims,
            &self.encoding_key,
        )?)
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedSession, TokenError> {
        let header = decode_header(token).map_err(|_| TokenError::MalformedToken)?;
        if header.alg != self.algorithm {
            debug!(alg = ?header.alg, "rejecting token signed with unexpected algorithm");
            return Err(TokenError::UnexpectedAlgorithm(header.alg));
        }

        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        let expires_at =
            DateTime::from_timestamp(data.claims.exp, 0).ok_or(TokenError::MalformedToken)?;

        Ok(VerifiedSession {
            claims: data.claims.session,
            expires_at,
        })
    }
}

fn is_rsa_family(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

fn public_pem_from_private(private_pem: &str) -> Result<String, TokenError> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
        .map_err(|_| TokenError::InvalidKey("failed to parse RSA private key".to_string()))?;

    RsaPublicKey::from(&private_key)
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| TokenError::InvalidKey(e.to_string()))
}
