//! Request authentication checks.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use teamgate_session::{TokenCodec, bearer_token};
use tracing::debug;

/// Decides whether a request carries acceptable credentials.
pub trait Validator: Send + Sync {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool;
}

impl<V: Validator + ?Sized> Validator for Arc<V> {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        (**self).is_authenticated(headers)
    }
}

/// Authenticates when any member does. An empty basket authenticates nobody.
#[derive(Clone, Default)]
pub struct ValidatorBasket {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorBasket {
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        Self { validators }
    }

    pub fn with(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }
}

impl Validator for ValidatorBasket {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        self.validators
            .iter()
            .any(|validator| validator.is_authenticated(headers))
    }
}

/// Accepts requests whose bearer token (header or session cookie) verifies.
#[derive(Clone)]
pub struct JwtValidator {
    codec: Arc<TokenCodec>,
}

impl JwtValidator {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }
}

impl Validator for JwtValidator {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        let Some(token) = bearer_token(headers) else {
            return false;
        };

        match self.codec.verify(&token) {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "session token rejected");
                false
            }
        }
    }
}

/// HTTP basic credentials checked against a single configured user.
#[derive(Clone)]
pub struct BasicAuthValidator {
    username: String,
    password: String,
}

impl BasicAuthValidator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn credentials(headers: &HeaderMap) -> Option<(String, String)> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let encoded = value
            .strip_prefix("Basic ")
            .or_else(|| value.strip_prefix("basic "))?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some((username.to_string(), password.to_string()))
    }
}

impl Validator for BasicAuthValidator {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        let Some((username, password)) = Self::credentials(headers) else {
            return false;
        };

        // Both halves are always compared.
        let matches = username.as_bytes().ct_eq(self.username.as_bytes())
            & password.as_bytes().ct_eq(self.password.as_bytes());
        matches.into()
    }
}

/// Treats every request as authenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthValidator;

impl Validator for NoAuthValidator {
    fn is_authenticated(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    struct Fixed(bool);

    impl Validator for Fixed {
        fn is_authenticated(&self, _headers: &HeaderMap) -> bool {
            self.0
        }
    }

    fn basic(user: &str, pass: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode(format!("{user}:{pass}"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_basket_any_validator_authenticates() {
        let headers = HeaderMap::new();
        let basket = ValidatorBasket::new(vec![Arc::new(Fixed(false)), Arc::new(Fixed(true))]);
        assert!(basket.is_authenticated(&headers));

        let basket = ValidatorBasket::new(vec![Arc::new(Fixed(false)), Arc::new(Fixed(false))]);
        assert!(!basket.is_authenticated(&headers));
    }

    #[test]
    fn test_empty_basket_rejects() {
        assert!(!ValidatorBasket::default().is_authenticated(&HeaderMap::new()));
        assert!(
            ValidatorBasket::default()
                .with(Arc::new(NoAuthValidator))
                .is_authenticated(&HeaderMap::new())
        );
    }

    #[test]
    fn test_basic_auth() {
        let validator = BasicAuthValidator::new("admin", "s3cret:with-colon");
        assert!(validator.is_authenticated(&basic("admin", "s3cret:with-colon")));
        assert!(!validator.is_authenticated(&basic("admin", "wrong")));
        assert!(!validator.is_authenticated(&basic("root", "s3cret:with-colon")));
        assert!(!validator.is_authenticated(&HeaderMap::new()));
    }

    #[test]
    fn test_basic_auth_ignores_garbage() {
        let validator = BasicAuthValidator::new("admin", "pw");
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic %%%"));
        assert!(!validator.is_authenticated(&headers));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert!(!validator.is_authenticated(&headers));
    }
}
