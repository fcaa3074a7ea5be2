//! Authentication against the dashboard API

use crate::error::handlers::{HttpErrorHandler, ValidationErrorHandler};
use crate::error::{CephError, Result};
use crate::logging::Logger;
use crate::transport::{ApiRequest, TokenSlot, Transport};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

/// Body returned by `POST /api/auth`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthInfo {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub permissions: HashMap<String, Vec<String>>,
    #[serde(default, rename = "pwdExpirationDate")]
    pub pwd_expiration_date: Option<Value>,
    #[serde(default)]
    pub sso: bool,
    #[serde(default, rename = "pwdUpdateRequired")]
    pub pwd_update_required: bool,
}

/// Claims carried in the dashboard's JWT
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub jti: Option<String>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT without verifying it
    pub fn decode(token: &str) -> Result<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| CephError::Parse("Token is not a JWT".to_string()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| CephError::Parse(format!("Invalid token payload: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn is_expired_at(&self, unix_secs: u64) -> bool {
        self.exp.map(|exp| exp <= unix_secs).unwrap_or(false)
    }
}

/// Logged-in state shared with the transport through the token slot
pub struct Session {
    transport: Arc<dyn Transport>,
    token: TokenSlot,
    auth: RwLock<Option<AuthInfo>>,
    logger: Logger,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, token: TokenSlot, logger: Logger) -> Self {
        Self {
            transport,
            token,
            auth: RwLock::new(None),
            logger,
        }
    }

    /// Log in and keep the returned token for subsequent requests
    pub async fn login(&self, username: &str, password: &str) -> Result<u16> {
        ValidationErrorHandler::require(username, "username")?;
        ValidationErrorHandler::require(password, "password")?;

        self.logger
            .verbose(&format!("Attempting authentication for user: {}", username));

        let request = ApiRequest::post("auth").with_json(&Credentials { username, password })?;
        let response = self.transport.execute(&request).await?;

        if !response.is_success() {
            return Err(match HttpErrorHandler::handle_api_error(response.status, &response.body, "login") {
                CephError::Api { status, detail, .. } => CephError::Authentication(format!(
                    "could not login (status {}): {}",
                    status,
                    detail.unwrap_or_default()
                )),
                other => other,
            });
        }

        let auth: AuthInfo = response.json()?;
        if auth.pwd_update_required {
            self.logger
                .warning(&format!("Password update required for user {}", auth.username));
        }

        self.store_token(Some(auth.token.clone()))?;
        *self
            .auth
            .write()
            .map_err(|_| CephError::Authentication("Failed to acquire session lock".to_string()))? =
            Some(auth);

        self.logger.success(&format!("Logged in as {}", username));
        Ok(response.status)
    }

    /// Invalidate the token on the server and forget it locally
    pub async fn logout(&self) -> Result<()> {
        let response = self
            .transport
            .execute(&ApiRequest::post("auth/logout"))
            .await?;

        if !response.is_success() {
            return Err(HttpErrorHandler::handle_api_error(
                response.status,
                &response.body,
                "logout",
            ));
        }

        self.store_token(None)?;
        if let Ok(mut guard) = self.auth.write() {
            *guard = None;
        }
        self.logger.detail("Logged out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    pub fn auth_info(&self) -> Option<AuthInfo> {
        self.auth.read().ok().and_then(|guard| guard.clone())
    }

    pub fn token_claims(&self) -> Option<TokenClaims> {
        let token = self.token.read().ok()?.clone()?;
        TokenClaims::decode(&token).ok()
    }

    /// Whether the current token has passed its `exp` claim
    pub fn token_expired(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.token_claims()
            .map(|claims| claims.is_expired_at(now))
            .unwrap_or(false)
    }

    fn store_token(&self, token: Option<String>) -> Result<()> {
        let mut guard = self
            .token
            .write()
            .map_err(|_| CephError::Authentication("Failed to acquire token write lock".to_string()))?;
        *guard = token;
        Ok(())
    }
}
