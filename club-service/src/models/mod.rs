pub mod account;
pub mod attachment;
pub mod event;
pub mod identity;
pub mod timestamp;

pub use account::{normalize_email, Account, AccountProfile, Role};
pub use attachment::Attachment;
pub use event::{Event, EventPatch, EventStatus, StatusChange};
pub use identity::IdentityClaims;
