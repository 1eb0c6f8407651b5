//! Lifecycle hooks for the `User` and `Token` content types.
//!
//! Handlers build a [`HookContext`], look the content type up in the
//! [`HookRegistry`] and run the hook for the event. A hook returning an error
//! aborts the request; hooks a type does not implement are no-ops.

mod token;
mod user;

pub use token::TokenHooks;
pub use user::UserHooks;

use async_trait::async_trait;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    dtos::access::{SignupRequest, UpdateUserRequest},
    models::{Grant, Identity},
    services::AccessError,
    utils::Password,
};

pub const USER: &str = "User";
pub const TOKEN: &str = "Token";

/// Payload carried into a hook.
pub enum ContentFields {
    Signup(SignupRequest),
    Credentials { password: Password },
    Profile(UpdateUserRequest),
}

/// What a hook produced for the handler to render.
#[derive(Debug)]
pub enum HookOutcome {
    Identity(Identity),
    Grant(Grant),
}

pub struct HookContext<'a> {
    pub request: &'a HeaderMap,
    pub response: &'a mut HeaderMap,
    /// Target identity
    pub email: String,
    pub fields: Option<ContentFields>,
    /// Grant already validated by the gatekeeper middleware, if any
    pub caller: Option<Grant>,
    pub outcome: Option<HookOutcome>,
}

impl<'a> HookContext<'a> {
    pub fn new(request: &'a HeaderMap, response: &'a mut HeaderMap, email: impl Into<String>) -> Self {
        Self {
            request,
            response,
            email: email.into(),
            fields: None,
            caller: None,
            outcome: None,
        }
    }

    pub fn with_fields(mut self, fields: ContentFields) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_caller(mut self, caller: Option<Grant>) -> Self {
        self.caller = caller;
        self
    }

    pub fn take_fields(&mut self) -> Option<ContentFields> {
        self.fields.take()
    }
}

#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn before_create(&self, _ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        Ok(())
    }

    async fn before_update(&self, _ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        Ok(())
    }

    async fn hide(&self, _ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        Ok(())
    }

    async fn after_approve(&self, _ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        Ok(())
    }

    async fn after_reject(&self, _ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        Ok(())
    }

    async fn after_delete(&self, _ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        Ok(())
    }

    async fn after_admin_delete(&self, _ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        Ok(())
    }
}

/// Content type name to hook implementation. Built once at startup.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<&'static str, Arc<dyn LifecycleHooks>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, content_type: &'static str, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks.insert(content_type, hooks);
        self
    }

    pub fn get(&self, content_type: &str) -> Result<Arc<dyn LifecycleHooks>, AccessError> {
        self.hooks.get(content_type).cloned().ok_or_else(|| {
            AccessError::Internal(anyhow::anyhow!(
                "No lifecycle hooks registered for {}",
                content_type
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoHooks;

    impl LifecycleHooks for NoHooks {}

    #[tokio::test]
    async fn unimplemented_hooks_are_noops() {
        let request = HeaderMap::new();
        let mut response = HeaderMap::new();
        let mut ctx = HookContext::new(&request, &mut response, "a@x.com");

        let hooks = NoHooks;
        hooks.before_create(&mut ctx).await.unwrap();
        hooks.hide(&mut ctx).await.unwrap();
        hooks.after_admin_delete(&mut ctx).await.unwrap();
        assert!(ctx.outcome.is_none());
    }

    #[test]
    fn registry_lookup() {
        let registry = HookRegistry::new().register(USER, Arc::new(NoHooks));
        assert!(registry.get(USER).is_ok());
        assert!(matches!(registry.get(TOKEN), Err(AccessError::Internal(_))));
    }
}
