use super::{AccessToken, Scope};
use crate::error::Error;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Holds a connection's access token.
///
/// The lock is held across a refresh, so concurrent callers that find the
/// token expired wait for the single in-flight refresh and reuse its result.
#[derive(Default)]
pub(crate) struct TokenStore {
    current: Mutex<Option<AccessToken>>,
}

impl TokenStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<AccessToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, token: AccessToken) {
        *self.lock() = Some(token);
    }

    pub(crate) fn clear(&self) -> Option<AccessToken> {
        self.lock().take()
    }

    pub(crate) fn current(&self) -> Option<AccessToken> {
        self.lock().clone()
    }

    /// Returns a token that grants `required` and has not expired, refreshing
    /// it through `refresh` when it has expired and can be refreshed.
    pub(crate) fn usable<F>(&self, required: &Scope, refresh: F) -> Result<AccessToken, Error>
    where
        F: FnOnce(&AccessToken) -> Result<AccessToken, Error>,
    {
        let mut guard = self.lock();
        let Some(token) = guard.as_ref() else {
            return Err(Error::NotAuthenticated(
                "authenticate the connection before issuing requests".to_string(),
            ));
        };
        if !token.scope().contains(required) {
            return Err(Error::InsufficientScope {
                required: required.to_string(),
                granted: token.scope().to_string(),
            });
        }
        if !token.is_expired() {
            return Ok(token.clone());
        }
        if !token.can_refresh() {
            return Err(Error::NotAuthenticated(
                "access token expired and cannot be refreshed".to_string(),
            ));
        }
        log::debug!("access token expired; refreshing");
        let refreshed = refresh(token)?;
        if !refreshed.scope().contains(required) {
            return Err(Error::InsufficientScope {
                required: required.to_string(),
                granted: refreshed.scope().to_string(),
            });
        }
        *guard = Some(refreshed.clone());
        Ok(refreshed)
    }
}
