//! Verification of third-party identity tokens (Google, Apple sign-in).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

const JWKS_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Identity token is invalid: {0}")]
    InvalidToken(String),

    #[error("Identity provider is not configured")]
    Disabled,

    #[error("Could not fetch provider keys: {0}")]
    Keys(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
    pub name: Option<String>,
    pub issuer: String,
    pub subject: String,
}

#[async_trait]
pub trait IdTokenVerifier: std::fmt::Debug + Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, OAuthError>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

/// Checks signature, expiry, issuer and audience, then pulls out the identity.
fn decode_claims(
    id_token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<VerifiedIdentity, OAuthError> {
    let claims = decode::<IdTokenClaims>(id_token, key, validation)
        .map_err(|e| OAuthError::InvalidToken(e.to_string()))?
        .claims;

    let email = claims
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| OAuthError::InvalidToken("token carries no email".to_string()))?;

    Ok(VerifiedIdentity {
        email: email.to_lowercase(),
        name: claims.name,
        issuer: claims.iss,
        subject: claims.sub,
    })
}

#[derive(Debug)]
pub struct JwksVerifier {
    client: reqwest::Client,
    jwks_url: String,
    issuers: Vec<String>,
    audiences: Vec<String>,
    cache: Mutex<Option<(JwkSet, Instant)>>,
}

impl JwksVerifier {
    pub fn new(jwks_url: impl Into<String>, issuers: Vec<String>, audiences: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwks_url: jwks_url.into(),
            issuers,
            audiences,
            cache: Mutex::new(None),
        }
    }

    pub fn google(client_ids: Vec<String>) -> Self {
        Self::new(
            "https://www.googleapis.com/oauth2/v3/certs",
            vec!["https://accounts.google.com".to_string(), "accounts.google.com".to_string()],
            client_ids,
        )
    }

    pub fn apple(client_ids: Vec<String>) -> Self {
        Self::new(
            "https://appleid.apple.com/auth/keys",
            vec!["https://appleid.apple.com".to_string()],
            client_ids,
        )
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&self.issuers);
        validation.set_audience(&self.audiences);
        validation
    }

    async fn keys(&self) -> Result<JwkSet, OAuthError> {
        let mut cache = self.cache.lock().await;
        if let Some((keys, fetched_at)) = cache.as_ref() {
            if fetched_at.elapsed() < JWKS_TTL {
                return Ok(keys.clone());
            }
        }

        let keys: JwkSet = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OAuthError::Keys(e.to_string()))?
            .json()
            .await
            .map_err(|e| OAuthError::Keys(e.to_string()))?;

        *cache = Some((keys.clone(), Instant::now()));
        Ok(keys)
    }
}

#[async_trait]
impl IdTokenVerifier for JwksVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, OAuthError> {
        if self.audiences.is_empty() {
            return Err(OAuthError::Disabled);
        }

        let header = decode_header(id_token).map_err(|e| OAuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| OAuthError::InvalidToken("token has no key id".to_string()))?;

        let keys = self.keys().await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| OAuthError::InvalidToken(format!("unknown key id {}", kid)))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| OAuthError::Keys(e.to_string()))?;

        decode_claims(id_token, &key, &self.validation())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const SECRET: &[u8] = b"provider-secret";

    fn token(iss: &str, aud: &str, email: Option<&str>) -> String {
        let claims = json!({
            "iss": iss,
            "aud": aud,
            "sub": "provider-user-1",
            "email": email,
            "name": "Ada",
            "exp": Utc::now().timestamp() + 600,
        });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&["https://accounts.google.com"]);
        validation.set_audience(&["client-1"]);
        validation
    }

    #[test]
    fn accepts_expected_issuer_and_audience() {
        let identity = decode_claims(
            &token("https://accounts.google.com", "client-1", Some("Ada@Example.com")),
            &DecodingKey::from_secret(SECRET),
            &validation(),
        )
        .unwrap();

        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.subject, "provider-user-1");
        assert_eq!(identity.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn rejects_foreign_audience_or_issuer() {
        let key = DecodingKey::from_secret(SECRET);
        let wrong_aud = token("https://accounts.google.com", "someone-else", Some("a@b.c"));
        let wrong_iss = token("https://evil.example", "client-1", Some("a@b.c"));

        assert!(matches!(decode_claims(&wrong_aud, &key, &validation()), Err(OAuthError::InvalidToken(_))));
        assert!(matches!(decode_claims(&wrong_iss, &key, &validation()), Err(OAuthError::InvalidToken(_))));
    }

    #[test]
    fn requires_an_email() {
        let result = decode_claims(
            &token("https://accounts.google.com", "client-1", None),
            &DecodingKey::from_secret(SECRET),
            &validation(),
        );
        assert!(matches!(result, Err(OAuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn provider_without_client_ids_is_disabled() {
        let verifier = JwksVerifier::google(vec![]);
        assert!(matches!(verifier.verify("anything").await, Err(OAuthError::Disabled)));
    }
}
