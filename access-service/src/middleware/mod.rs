pub mod admin;
pub mod gatekeeper;

pub use admin::admin_auth_middleware;
pub use gatekeeper::{gatekeeper_middleware, AuthGrant};
