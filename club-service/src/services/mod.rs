//! Services layer for the club service.
//!
//! Authentication flows, access decisions and the event, account and
//! attachment operations built on top of them.

pub mod access;
mod accounts;
mod attachments;
pub mod auth;
mod database;
pub mod error;
mod events;
pub mod google;
mod identity;
mod jwt;
pub mod maintenance;
pub mod oauth_state;
pub mod storage;
pub mod store;

pub use accounts::AccountService;
pub use attachments::{AttachmentService, Upload};
pub use auth::{AuthService, AuthSession, OAuthOutcome, OAuthStart};
pub use database::MongoDb;
pub use error::{ServiceError, TokenError};
pub use events::{EventDraft, EventService};
pub use google::{GoogleOAuthClient, IdentityProvider, ProviderIdentity, ProviderTokens};
pub use identity::IdentityResolver;
pub use jwt::{JwtService, SessionClaims, TokenSubject};
pub use maintenance::{sweep_invalid_passwords, SweepReport};
pub use oauth_state::{ExchangeState, OAuthStateService};
pub use storage::{InMemoryStorage, LocalStorage, ObjectStorage};
pub use store::{AccountStore, AttachmentStore, EventStore, InMemoryStore};
