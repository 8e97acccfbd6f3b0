use super::Scope;
use crate::client_defaults::TOKEN_EXPIRY_DRIFT;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How the token is presented to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Bearer,
    ApiKey,
}

/// Short-lived credential bound to a scope. Never persisted by this crate.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    scope: Scope,
    expires_at: Option<SystemTime>,
    refresh_token: Option<String>,
    refresh_until: Option<SystemTime>,
    identity: Option<String>,
    pub(crate) kind: TokenKind,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, scope: Scope) -> Self {
        Self {
            token: token.into(),
            scope,
            expires_at: None,
            refresh_token: None,
            refresh_until: None,
            identity: None,
            kind: TokenKind::Bearer,
        }
    }

    pub fn with_expiry(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_refresh(mut self, refresh_token: impl Into<String>, until: Option<SystemTime>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self.refresh_until = until;
        self
    }

    pub(crate) fn with_identity(mut self, identity: Option<String>) -> Self {
        self.identity = identity;
        self
    }

    pub(crate) fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub(crate) fn with_kind(mut self, kind: TokenKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// True once the token is within the expiry drift of its expiry time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    pub(crate) fn is_expired_at(&self, now: SystemTime) -> bool {
        match self.expires_at {
            Some(expires_at) => now + TOKEN_EXPIRY_DRIFT >= expires_at,
            None => false,
        }
    }

    /// True when a refresh token exists and its own deadline has not passed.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
            && self
                .refresh_until
                .map_or(true, |until| SystemTime::now() < until)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("scope", &self.scope.to_string())
            .field("expires_at", &self.expires_at)
            .field("refreshable", &self.refresh_token.is_some())
            .field("identity", &self.identity)
            .finish()
    }
}

pub(crate) fn unix_to_system_time(secs: i64) -> Option<SystemTime> {
    u64::try_from(secs)
        .ok()
        .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs)))
}
