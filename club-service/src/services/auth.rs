use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::models::{Account, AccountProfile};
use crate::services::{
    error::ServiceError,
    google::IdentityProvider,
    identity::IdentityResolver,
    jwt::{JwtService, TokenSubject},
    oauth_state::{ExchangeState, OAuthStateService},
    store::AccountStore,
};
use crate::utils::Password;

/// Issued session plus the public profile it was issued for.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthSession {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: AccountProfile,
}

/// First leg of the OAuth flow.
#[derive(Debug, Clone)]
pub struct OAuthStart {
    pub auth_url: String,
    pub state: String,
    pub nonce: String,
}

#[derive(Debug, Clone)]
pub struct OAuthOutcome {
    pub session: AuthSession,
    pub redirect_target: Option<String>,
}

/// Entry point for every login flow and for per-request authentication.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    state: OAuthStateService,
    identities: IdentityResolver,
    accounts: Arc<dyn AccountStore>,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        state: OAuthStateService,
        accounts: Arc<dyn AccountStore>,
        jwt: JwtService,
    ) -> Self {
        Self {
            provider,
            state,
            identities: IdentityResolver::new(accounts.clone()),
            accounts,
            jwt,
        }
    }

    pub fn state_ttl(&self) -> chrono::Duration {
        self.state.ttl()
    }

    pub fn start_oauth(&self, redirect_target: Option<String>) -> Result<OAuthStart, ServiceError> {
        let (state, exchange) = self.state.mint(redirect_target)?;
        let auth_url = self.provider.authorization_url(&state);

        Ok(OAuthStart {
            auth_url,
            state,
            nonce: exchange.nonce,
        })
    }

    pub fn open_exchange(
        &self,
        state: &str,
        presented_nonce: Option<&str>,
    ) -> Result<ExchangeState, ServiceError> {
        self.state.open(state, presented_nonce)
    }

    /// Second leg: code exchange, identity resolution and token issuance.
    #[tracing::instrument(skip_all)]
    pub async fn complete_oauth(
        &self,
        code: &str,
        exchange: ExchangeState,
    ) -> Result<OAuthOutcome, ServiceError> {
        let tokens = self.provider.exchange_code(code).await?;
        let userinfo = self.provider.fetch_identity(&tokens.access_token).await?;

        let verified = match tokens.id_token.as_deref() {
            Some(id_token) => self.provider.verify_identity_token(id_token).await,
            None => None,
        };
        let identity = match verified {
            Some(from_token) => from_token.or(userinfo),
            None => userinfo,
        };

        let claims = identity.into_claims()?;
        let account = self.identities.resolve_or_create(&claims).await?;
        let session = self.issue_session(&account)?;

        tracing::info!(user_id = %account.id, "OAuth login completed");

        Ok(OAuthOutcome {
            session,
            redirect_target: exchange.redirect_target,
        })
    }

    pub async fn register(
        &self,
        name: String,
        email: &str,
        password: Password,
    ) -> Result<AccountProfile, ServiceError> {
        let account = self.identities.register_local(name, email, password).await?;
        Ok(account.profile())
    }

    pub async fn login(
        &self,
        email: &str,
        password: Password,
    ) -> Result<AuthSession, ServiceError> {
        let account = self.identities.authenticate_local(email, password).await?;
        tracing::info!(user_id = %account.id, "Password login");
        self.issue_session(&account)
    }

    /// Resolves a bearer token to the account it was issued for.
    pub async fn authenticate(&self, token: &str) -> Result<Account, ServiceError> {
        let claims = self.jwt.verify(token).map_err(|e| {
            tracing::debug!(error = ?e, "Session token rejected");
            ServiceError::from(e)
        })?;

        self.accounts
            .find_account(&claims.sub)
            .await?
            .ok_or(ServiceError::Unauthorized)
    }

    fn issue_session(&self, account: &Account) -> Result<AuthSession, ServiceError> {
        let access_token = self.jwt.issue(&TokenSubject::from(account))?;

        Ok(AuthSession {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.jwt.expires_in_seconds(),
            user: account.profile(),
        })
    }
}
