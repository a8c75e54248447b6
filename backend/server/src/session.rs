//! # Sessions
//!
//! The client keeps its session id in a `sessionId` cookie and forwards it as
//! `Authorization: Bearer <token>`. When the cookie is missing the client still
//! sends the header, with the literal token `undefined`.
//!
//! Verifying the token is the gateway's job. Here we only pull it out of the
//! request so every service call receives the caller explicitly, and refuse
//! requests without one when `REQUIRE_SESSION` is set.
use std::{fmt, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};

use crate::{error::AppError, state::AppState};

pub const SESSION_COOKIE: &str = "sessionId";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            token: bearer(headers).or_else(|| cookie(headers)),
        }
    }
}

/// Only a short prefix of the token is ever logged.
impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => {
                let prefix: String = token.chars().take(6).collect();
                write!(f, "session {prefix}…")
            }
            None => f.write_str("anonymous session"),
        }
    }
}

fn usable(token: &str) -> Option<String> {
    let token = token.trim();

    match token {
        "" | "undefined" | "null" => None,
        token => Some(token.to_string()),
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?;

    usable(token)
}

fn cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, token)| usable(token))
}

impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_headers(&parts.headers);

        if state.config.require_session && session.token.is_none() {
            return Err(AppError::Unauthorized);
        }

        Ok(session)
    }
}
