//! Password gate in front of the registration listing.
//!
//! This is a cosmetic gate, not a security boundary. Login hands back a bare
//! millisecond timestamp that the client echoes in `x-acp-auth`; it is
//! unsigned and any client can forge one. Anything that must stay private
//! needs real authentication in front of this service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const AUTH_HEADER: &str = "x-acp-auth";
pub const SESSION_TTL_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub authenticated: bool,
    pub timestamp: i64,
}

pub fn login(
    configured: Option<&str>,
    attempt: &str,
    now: DateTime<Utc>,
) -> Result<LoginResponse, AppError> {
    let password = configured.ok_or(AppError::SummaryDisabled)?;
    if attempt != password {
        return Err(AppError::WrongPassword);
    }
    Ok(LoginResponse {
        authenticated: true,
        timestamp: now.timestamp_millis(),
    })
}

/// Accept a login timestamp younger than 24 hours.
pub fn check_session(
    configured: Option<&str>,
    header: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    configured.ok_or(AppError::SummaryDisabled)?;

    let issued: i64 = header
        .and_then(|h| h.trim().parse().ok())
        .ok_or(AppError::SessionExpired)?;
    let age = now.timestamp_millis() - issued;
    if (0..SESSION_TTL_MS).contains(&age) {
        Ok(())
    } else {
        Err(AppError::SessionExpired)
    }
}
