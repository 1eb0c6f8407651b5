use async_trait::async_trait;

use super::{ContentFields, HookContext, HookOutcome, LifecycleHooks};
use crate::services::{authorize, AccessError, Gatekeeper, LifecycleService, TokenTransport};

/// Hooks of the `User` content type.
#[derive(Clone)]
pub struct UserHooks {
    lifecycle: LifecycleService,
    gatekeeper: Gatekeeper,
    transport: TokenTransport,
}

impl UserHooks {
    pub fn new(lifecycle: LifecycleService, gatekeeper: Gatekeeper, transport: TokenTransport) -> Self {
        Self {
            lifecycle,
            gatekeeper,
            transport,
        }
    }

    /// Ownership gate shared by update, hide and self-delete.
    async fn require_owner(&self, ctx: &HookContext<'_>) -> Result<(), AccessError> {
        match &ctx.caller {
            Some(grant) => authorize(grant, &ctx.email),
            None => self
                .gatekeeper
                .require_owner(ctx.request, &ctx.email)
                .await
                .map(|_| ()),
        }
    }
}

#[async_trait]
impl LifecycleHooks for UserHooks {
    async fn before_create(&self, ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        let req = match ctx.take_fields() {
            Some(ContentFields::Signup(req)) => req,
            _ => return Err(AccessError::Validation("Signup details are required".into())),
        };

        let identity = self.lifecycle.signup(req).await?;
        ctx.outcome = Some(HookOutcome::Identity(identity));
        Ok(())
    }

    async fn before_update(&self, ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        self.require_owner(ctx).await?;

        let req = match ctx.take_fields() {
            Some(ContentFields::Profile(req)) => req,
            _ => return Err(AccessError::Validation("Profile changes are required".into())),
        };

        let identity = self.lifecycle.update_profile(&ctx.email, req).await?;
        ctx.outcome = Some(HookOutcome::Identity(identity));
        Ok(())
    }

    async fn hide(&self, ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        self.require_owner(ctx).await?;
        self.lifecycle.hide(&ctx.email).await
    }

    async fn after_approve(&self, ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        // The administrator must never receive the user's token.
        self.transport.clear(ctx.response);
        let result = self.lifecycle.approve(&ctx.email).await;
        self.transport.clear(ctx.response);

        ctx.outcome = Some(HookOutcome::Identity(result?));
        Ok(())
    }

    async fn after_reject(&self, ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        let identity = self.lifecycle.reject(&ctx.email).await?;
        ctx.outcome = Some(HookOutcome::Identity(identity));
        Ok(())
    }

    async fn after_delete(&self, ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        self.require_owner(ctx).await?;
        self.lifecycle.delete(&ctx.email).await?;
        self.transport.clear(ctx.response);
        Ok(())
    }

    async fn after_admin_delete(&self, ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        self.lifecycle.delete(&ctx.email).await
    }
}
