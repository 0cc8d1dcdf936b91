//! Google OAuth 2.0 authorization-code client.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::GoogleOAuthConfig;
use crate::models::{normalize_email, IdentityClaims};
use crate::services::error::ServiceError;

pub const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const SCOPES: &str = "openid email profile";
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Tokens returned by the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Identity as reported by the provider, before required claims are checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderIdentity {
    pub subject: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl ProviderIdentity {
    /// Field-wise merge where `self` wins over `fallback`.
    pub fn or(self, fallback: ProviderIdentity) -> ProviderIdentity {
        ProviderIdentity {
            subject: self.subject.or(fallback.subject),
            email_verified: if self.email.is_some() {
                self.email_verified
            } else {
                fallback.email_verified
            },
            email: self.email.or(fallback.email),
            name: self.name.or(fallback.name),
            picture: self.picture.or(fallback.picture),
        }
    }

    pub fn into_claims(self) -> Result<IdentityClaims, ServiceError> {
        let subject = self
            .subject
            .filter(|s| !s.is_empty())
            .ok_or(ServiceError::IncompleteIdentity)?;
        let email = self
            .email
            .map(|e| normalize_email(&e))
            .filter(|e| !e.is_empty())
            .ok_or(ServiceError::IncompleteIdentity)?;
        if self.email_verified == Some(false) {
            return Err(ServiceError::IncompleteIdentity);
        }

        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.clone());

        Ok(IdentityClaims {
            subject,
            email,
            name,
            picture: self.picture.filter(|p| !p.is_empty()),
        })
    }
}

/// Outbound side of the authorization-code flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Leg 1: where to send the browser. No network access.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ServiceError>;

    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity, ServiceError>;

    /// `None` when the token cannot be verified.
    async fn verify_identity_token(&self, id_token: &str) -> Option<ProviderIdentity>;
}

/// JWKS (JSON Web Key Set)
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwkKey {
    pub kty: String,
    pub kid: Option<String>,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

struct CachedJwks {
    fetched_at: Instant,
    jwks: Jwks,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    id: Option<String>,
    email: Option<String>,
    verified_email: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: Option<String>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    config: GoogleOAuthConfig,
    jwks_cache: Arc<RwLock<Option<CachedJwks>>>,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleOAuthConfig) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http,
            config,
            jwks_cache: Arc::new(RwLock::new(None)),
        })
    }

    async fn fetch_jwks(&self) -> Result<Jwks, ServiceError> {
        tracing::debug!(uri = %self.config.jwks_uri, "Fetching provider JWKS");
        let response = self
            .http
            .get(&self.config.jwks_uri)
            .send()
            .await
            .map_err(|e| ServiceError::ProviderError(format!("JWKS request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::ProviderError(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<Jwks>()
            .await
            .map_err(|e| ServiceError::ProviderError(format!("Invalid JWKS document: {}", e)))
    }

    /// Cached key lookup; refetches when the cache is stale or lacks `kid`.
    async fn signing_key(&self, kid: &str) -> Result<Option<JwkKey>, ServiceError> {
        {
            let cache = self.jwks_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    if let Some(key) = find_key(&cached.jwks, kid) {
                        return Ok(Some(key));
                    }
                }
            }
        }

        let jwks = self.fetch_jwks().await?;
        let key = find_key(&jwks, kid);
        *self.jwks_cache.write().await = Some(CachedJwks {
            fetched_at: Instant::now(),
            jwks,
        });
        Ok(key)
    }

    async fn try_verify(&self, id_token: &str) -> Result<ProviderIdentity, String> {
        let header = decode_header(id_token).map_err(|e| format!("bad header: {}", e))?;
        if header.alg != Algorithm::RS256 {
            return Err(format!("unexpected algorithm {:?}", header.alg));
        }
        let kid = header.kid.ok_or("missing kid")?;

        let key = self
            .signing_key(&kid)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no key for kid {}", kid))?;

        let (Some(n), Some(e)) = (key.n.as_deref(), key.e.as_deref()) else {
            return Err("RSA key missing components".to_string());
        };
        let decoding_key =
            DecodingKey::from_rsa_components(n, e).map_err(|e| format!("bad RSA key: {}", e))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.config.client_id.as_str()]);

        let claims = decode::<IdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| format!("invalid token: {}", e))?
            .claims;

        Ok(ProviderIdentity {
            subject: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            name: claims.name,
            picture: claims.picture,
        })
    }
}

fn find_key(jwks: &Jwks, kid: &str) -> Option<JwkKey> {
    jwks.keys
        .iter()
        .find(|k| k.kty == "RSA" && k.kid.as_deref() == Some(kid))
        .cloned()
}

#[async_trait]
impl IdentityProvider for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=online&prompt=select_account",
            self.config.auth_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
        )
    }

    #[tracing::instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ServiceError> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::ProviderError(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ProviderError(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        response.json::<ProviderTokens>().await.map_err(|e| {
            ServiceError::ProviderError(format!("Failed to parse token response: {}", e))
        })
    }

    #[tracing::instrument(skip_all)]
    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity, ServiceError> {
        let response = self
            .http
            .get(&self.config.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ServiceError::ProviderError(format!("Userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::ProviderError(format!(
                "Userinfo endpoint returned {}",
                response.status()
            )));
        }

        let info = response.json::<UserInfoResponse>().await.map_err(|e| {
            ServiceError::ProviderError(format!("Failed to parse userinfo response: {}", e))
        })?;

        Ok(ProviderIdentity {
            subject: info.id,
            email: info.email,
            email_verified: info.verified_email,
            name: info.name,
            picture: info.picture,
        })
    }

    async fn verify_identity_token(&self, id_token: &str) -> Option<ProviderIdentity> {
        match self.try_verify(id_token).await {
            Ok(identity) => Some(identity),
            Err(reason) => {
                tracing::warn!(reason = %reason, "Discarding unverifiable ID token");
                None
            }
        }
    }
}
