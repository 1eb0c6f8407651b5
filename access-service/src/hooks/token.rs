use async_trait::async_trait;

use super::{ContentFields, HookContext, HookOutcome, LifecycleHooks};
use crate::services::{AccessError, GrantIssuer};

/// Hooks of the `Token` content type. Creating a token is logging in.
#[derive(Clone)]
pub struct TokenHooks {
    issuer: GrantIssuer,
}

impl TokenHooks {
    pub fn new(issuer: GrantIssuer) -> Self {
        Self { issuer }
    }
}

#[async_trait]
impl LifecycleHooks for TokenHooks {
    async fn before_create(&self, ctx: &mut HookContext<'_>) -> Result<(), AccessError> {
        let password = match ctx.take_fields() {
            Some(ContentFields::Credentials { password }) => password,
            _ => {
                self.issuer.transport().clear(ctx.response);
                return Err(AccessError::Validation("Credentials are required".into()));
            }
        };

        let grant = self
            .issuer
            .login(&ctx.email, &password, ctx.response)
            .await
            .map_err(|e| {
                if matches!(e, AccessError::AuthenticationFailed) {
                    tracing::warn!(email = %ctx.email, "Login failed");
                }
                e
            })?;

        ctx.outcome = Some(HookOutcome::Grant(grant));
        Ok(())
    }
}
