/// Session Issuance
///
/// Mints access/refresh token pairs on login and registration, and rotates
/// them on refresh. Whether refresh tokens are tracked server-side is decided
/// by the `RefreshTokenTracker` wired in at construction.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::auth::claims::TokenType;
use crate::auth::clock::{Clock, SystemClock};
use crate::auth::jwt::TokenCodec;
use crate::auth::refresh_token::{RefreshTokenTracker, StatelessTracker, StoreTracker};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError};
use crate::users::UserStore;

/// Access and refresh token minted for the same subject at the same instant
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionIssuer {
    codec: TokenCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
    tracker: Arc<dyn RefreshTokenTracker>,
    clock: Arc<dyn Clock>,
}

impl SessionIssuer {
    pub fn new(
        codec: TokenCodec,
        access_ttl: Duration,
        refresh_ttl: Duration,
        tracker: Arc<dyn RefreshTokenTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec,
            access_ttl,
            refresh_ttl,
            tracker,
            clock,
        }
    }

    /// Build the production issuer: wall clock, and a store-backed tracker
    /// unless tracking is switched off.
    ///
    /// # Errors
    /// Returns `TokenIssuance` if the signing secret is empty
    pub fn from_settings(
        settings: &AuthSettings,
        store: Arc<dyn UserStore>,
    ) -> Result<Self, AppError> {
        let codec = TokenCodec::new(&settings.signing_secret)?;
        let tracker: Arc<dyn RefreshTokenTracker> = if settings.track_refresh_tokens {
            Arc::new(StoreTracker::new(store))
        } else {
            tracing::warn!("Refresh token tracking disabled, reuse of refresh tokens is not detected");
            Arc::new(StatelessTracker)
        };

        Ok(Self::new(
            codec,
            settings.access_token_ttl,
            settings.refresh_token_ttl,
            tracker,
            Arc::new(SystemClock),
        ))
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Sign a fresh pair for `subject`; nothing is persisted.
    ///
    /// # Errors
    /// Returns `TokenIssuance` if either token fails to sign
    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, AppError> {
        let now = self.clock.now();

        let access_token = self
            .codec
            .issue(subject, TokenType::Access, self.access_ttl, now)?;
        let refresh_token = self
            .codec
            .issue(subject, TokenType::Refresh, self.refresh_ttl, now)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Issue a pair after login or registration and record its refresh token,
    /// superseding any earlier one.
    pub async fn start_session(&self, subject: &str) -> Result<TokenPair, AppError> {
        let pair = self.issue_pair(subject)?;
        self.tracker.save(subject, &pair.refresh_token).await?;
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair
    ///
    /// The presented token must be a correctly signed, unexpired refresh token
    /// with a subject, and (when tracking) the one currently recorded for that
    /// subject. The new refresh token replaces it atomically.
    ///
    /// # Errors
    /// - `Unauthorized` for any token or tracking failure
    /// - `TokenIssuance` if signing the new pair fails
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self
            .codec
            .parse(refresh_token, self.clock.now())
            .map_err(|e| {
                tracing::warn!(reason = %e, "Refresh token rejected");
                AuthError::Unauthorized("invalid or expired token")
            })?;

        if claims.token_type != TokenType::Refresh {
            tracing::warn!(token_type = claims.token_type.as_str(), "Wrong token type presented for refresh");
            return Err(AuthError::Unauthorized("invalid token type").into());
        }

        let subject = claims
            .subject_as::<String>()
            .ok_or(AuthError::Unauthorized("invalid subject"))?;

        let pair = self.issue_pair(&subject)?;

        if !self
            .tracker
            .rotate(&subject, refresh_token, &pair.refresh_token)
            .await?
        {
            tracing::warn!(user_id = %subject, "Superseded or revoked refresh token presented");
            return Err(AuthError::Unauthorized("invalid or expired token").into());
        }

        tracing::info!(user_id = %subject, "Token pair rotated");
        Ok(pair)
    }

    /// Invalidate the subject's refresh token (logout).
    pub async fn end_session(&self, subject: &str) -> Result<(), AppError> {
        self.tracker.revoke(subject).await
    }
}
