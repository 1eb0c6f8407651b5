//! Out-of-band hand-off of a grant minted during administrator approval.
//!
//! The approving administrator never sees the user's token; it goes to the
//! user through one of these channels instead.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::sync::Mutex;
use std::time::Duration;

use crate::{
    config::SmtpConfig,
    models::{Grant, Identity},
    services::AccessError,
};

#[async_trait]
pub trait GrantDelivery: Send + Sync {
    async fn deliver(&self, identity: &Identity, grant: &Grant) -> Result<(), AccessError>;
}

/// Emails the access token to the approved user.
#[derive(Clone)]
pub struct SmtpDelivery {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpDelivery {
    pub fn new(config: &SmtpConfig) -> Result<Self, AccessError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.relay)
            .map_err(|e| AccessError::Delivery(e.to_string()))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(relay = %config.relay, "Grant delivery initialized with SMTP");

        Ok(Self {
            mailer,
            from_email: config.from.clone(),
        })
    }

    fn compose(&self, identity: &Identity, grant: &Grant) -> Result<Message, AccessError> {
        let (plain_body, html_body) = approval_bodies(identity, grant);

        Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| AccessError::Delivery(e.to_string()))?,
            )
            .to(identity
                .email
                .parse()
                .map_err(|e: lettre::address::AddressError| AccessError::Delivery(e.to_string()))?)
            .subject("Your account has been approved")
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| AccessError::Delivery(e.to_string()))
    }
}

#[async_trait]
impl GrantDelivery for SmtpDelivery {
    async fn deliver(&self, identity: &Identity, grant: &Grant) -> Result<(), AccessError> {
        let email = self.compose(identity, grant)?;

        // SmtpTransport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AccessError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(email = %identity.email, "Approval grant delivered");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    email = %identity.email,
                    "Failed to deliver approval grant"
                );
                Err(AccessError::Delivery(e.to_string()))
            }
        }
    }
}

/// Plain-text and HTML bodies of the approval mail. User-supplied profile
/// fields appear in the plain-text part only.
fn approval_bodies(identity: &Identity, grant: &Grant) -> (String, String) {
    let plain = format!(
        "Hello {},\n\nYour account has been approved.\n\n\
         Access token: {}\n\
         Valid until: {}\n\n\
         Present it as \"Authorization: Bearer <token>\" or log in with your password.",
        identity.first_name,
        grant.token,
        grant.expires_at.to_rfc2822(),
    );

    let html = format!(
        r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Your account has been approved</h2>
        <p>Your access token:</p>
        <pre style="background-color: #f4f4f4; padding: 12px;">{}</pre>
        <p style="color: #666; font-size: 12px;">Valid until {}. You can also log in with your password.</p>
    </body>
</html>"#,
        grant.token,
        grant.expires_at.to_rfc2822(),
    );

    (plain, html)
}

/// Records the approval without sending anything. The user obtains a token
/// by logging in.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDelivery;

#[async_trait]
impl GrantDelivery for DisabledDelivery {
    async fn deliver(&self, identity: &Identity, grant: &Grant) -> Result<(), AccessError> {
        tracing::info!(
            email = %identity.email,
            expires_at = %grant.expires_at,
            "Grant delivery disabled; user must log in to obtain a token"
        );
        Ok(())
    }
}

/// Keeps delivered grants in memory.
#[derive(Debug, Default)]
pub struct RecordingDelivery {
    delivered: Mutex<Vec<Grant>>,
    fail: bool,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn delivered(&self) -> Vec<Grant> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Most recent grant delivered to `email`.
    pub fn last_for(&self, email: &str) -> Option<Grant> {
        self.delivered()
            .into_iter()
            .rev()
            .find(|grant| grant.owner == email)
    }
}

#[async_trait]
impl GrantDelivery for RecordingDelivery {
    async fn deliver(&self, _identity: &Identity, grant: &Grant) -> Result<(), AccessError> {
        if self.fail {
            return Err(AccessError::Delivery("delivery channel unavailable".into()));
        }
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(grant.clone());
        Ok(())
    }
}
