//! Services layer for access-service.
//!
//! Credential verification, the pending-registration ledger, grant issuance,
//! grant validation and the identity lifecycle built on top of them.

mod clock;
mod credentials;
mod delivery;
pub mod error;
mod gatekeeper;
mod grants;
mod ledger;
mod lifecycle;
pub mod store;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::CredentialStore;
pub use delivery::{DisabledDelivery, GrantDelivery, RecordingDelivery, SmtpDelivery};
pub use error::AccessError;
pub use gatekeeper::{authorize, Gatekeeper};
pub use grants::GrantIssuer;
pub use ledger::PendingLedger;
pub use lifecycle::LifecycleService;
pub use transport::{TokenTransport, DEFAULT_COOKIE_NAME};
