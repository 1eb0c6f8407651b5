pub mod grant;
pub mod identity;
pub mod pending;

pub use grant::{hash_token, Grant, GrantRecord, DEFAULT_GRANT_TTL_HOURS, MAX_GRANT_TTL_HOURS};
pub use identity::{normalize_email, AccountStatus, Identity, IdentityResponse, ProfileChanges};
pub use pending::PendingRegistration;
