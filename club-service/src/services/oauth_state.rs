use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::services::error::ServiceError;

const STATE_AUDIENCE: &str = "oauth-state";

/// Per-login exchange state, recovered on the callback leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeState {
    pub nonce: String,
    pub redirect_target: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect_target: Option<String>,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Mints signed, short-lived `state` values for the authorization-code flow.
///
/// The nonce inside the state must match the one the browser presents in its
/// cookie; the signature keeps the redirect target from being swapped.
#[derive(Clone)]
pub struct OAuthStateService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl OAuthStateService {
    pub fn new(secret: &Secret<String>, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the `state` parameter to send to the provider plus the state it encodes.
    pub fn mint(
        &self,
        redirect_target: Option<String>,
    ) -> Result<(String, ExchangeState), ServiceError> {
        self.mint_with_ttl(redirect_target, self.ttl)
    }

    fn mint_with_ttl(
        &self,
        redirect_target: Option<String>,
        ttl: Duration,
    ) -> Result<(String, ExchangeState), ServiceError> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let nonce = URL_SAFE_NO_PAD.encode(bytes);

        let now = Utc::now();
        let claims = StateClaims {
            nonce: nonce.clone(),
            redirect_target: redirect_target.clone(),
            aud: STATE_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode OAuth state: {}", e))?;

        Ok((
            token,
            ExchangeState {
                nonce,
                redirect_target,
            },
        ))
    }

    /// Validates the returned `state` against the nonce from the browser cookie.
    pub fn open(
        &self,
        state: &str,
        presented_nonce: Option<&str>,
    ) -> Result<ExchangeState, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[STATE_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "aud"]);

        let claims = decode::<StateClaims>(state, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected OAuth state");
                ServiceError::StateMismatch
            })?
            .claims;

        let matches = presented_nonce
            .map(|n| bool::from(n.as_bytes().ct_eq(claims.nonce.as_bytes())))
            .unwrap_or(false);

        if !matches {
            tracing::warn!(
                cookie_present = presented_nonce.is_some(),
                "OAuth state nonce mismatch"
            );
            return Err(ServiceError::StateMismatch);
        }

        Ok(ExchangeState {
            nonce: claims.nonce,
            redirect_target: claims.redirect_target,
        })
    }
}
