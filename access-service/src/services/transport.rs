//! Where the bearer token travels: the `Authorization` header or a cookie.
//!
//! The issuer writes through it and the gatekeeper reads through it, so both
//! sides always agree on the channel.

use axum::http::{header, HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};

use crate::{models::Grant, services::AccessError};

pub const DEFAULT_COOKIE_NAME: &str = "access_token";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TokenTransport {
    /// `Authorization: Bearer <token>`
    #[default]
    Header,
    /// `HttpOnly; Secure; SameSite=Strict` cookie
    Cookie { name: String },
}

impl TokenTransport {
    pub fn cookie(name: impl Into<String>) -> Self {
        TokenTransport::Cookie { name: name.into() }
    }

    /// Token presented on an inbound request, if any.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        let token = match self {
            TokenTransport::Header => headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string()),
            TokenTransport::Cookie { name } => CookieJar::from_headers(headers)
                .get(name)
                .map(|cookie| cookie.value().to_string()),
        };

        token.filter(|t| !t.is_empty())
    }

    /// Put the grant's token on the outbound response.
    pub fn write(
        &self,
        response: &mut HeaderMap,
        grant: &Grant,
        now: DateTime<Utc>,
    ) -> Result<(), AccessError> {
        match self {
            TokenTransport::Header => {
                let value = HeaderValue::from_str(&format!("Bearer {}", grant.token))
                    .map_err(|e| AccessError::Internal(e.into()))?;
                response.insert(header::AUTHORIZATION, value);
            }
            TokenTransport::Cookie { name } => {
                let cookie = Cookie::build((name.clone(), grant.token.clone()))
                    .path("/")
                    .http_only(true)
                    .secure(true)
                    .same_site(SameSite::Strict)
                    .max_age(time::Duration::seconds(grant.remaining_seconds(now)))
                    .build();
                let value = HeaderValue::from_str(&cookie.to_string())
                    .map_err(|e| AccessError::Internal(e.into()))?;
                response.append(header::SET_COOKIE, value);
            }
        }
        Ok(())
    }

    /// Strip anything this transport wrote to the response.
    pub fn clear(&self, response: &mut HeaderMap) {
        match self {
            TokenTransport::Header => {
                response.remove(header::AUTHORIZATION);
            }
            TokenTransport::Cookie { name } => {
                let prefix = format!("{}=", name);
                let kept: Vec<HeaderValue> = response
                    .get_all(header::SET_COOKIE)
                    .iter()
                    .filter(|value| {
                        !value
                            .to_str()
                            .map(|v| v.starts_with(&prefix))
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect();

                response.remove(header::SET_COOKIE);
                for value in kept {
                    response.append(header::SET_COOKIE, value);
                }
            }
        }
    }

    /// Whether the response carries a token artifact from this transport.
    pub fn is_present(&self, response: &HeaderMap) -> bool {
        match self {
            TokenTransport::Header => response.contains_key(header::AUTHORIZATION),
            TokenTransport::Cookie { name } => {
                let prefix = format!("{}=", name);
                response
                    .get_all(header::SET_COOKIE)
                    .iter()
                    .any(|v| v.to_str().map(|v| v.starts_with(&prefix)).unwrap_or(false))
            }
        }
    }
}
