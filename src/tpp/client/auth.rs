use super::{parse_error_payload, TppConnection};
use crate::auth::{unix_to_system_time, AccessToken, Credentials, Scope};
use crate::connection::common;
use crate::error::{fallback_message, read_body_with_limit, ApiError, Error, MAX_ERROR_BODY_BYTES};
use crate::models::tpp::{AuthorizeRequest, OAuthError, RefreshRequest, TokenResponse};
use reqwest::blocking::Response;
use reqwest::StatusCode;
use std::time::{Duration, SystemTime};

impl TppConnection {
    pub(super) fn authenticate_with(
        &self,
        credentials: &Credentials,
        scope: &str,
    ) -> Result<AccessToken, Error> {
        let requested = Scope::parse(scope);
        self.token.clear();
        let token = match credentials {
            Credentials::UserPassword { user, password } => {
                self.get_access_token(user, password, scope)?
            }
            Credentials::RefreshToken(refresh_token) => {
                let token = self.refresh_access_token(refresh_token)?;
                if token.scope().is_empty() {
                    token.with_scope(requested.clone())
                } else {
                    token
                }
            }
            Credentials::AccessToken { token, scope } => {
                AccessToken::new(token.clone(), Scope::parse(scope))
            }
            Credentials::ApiKey(_) => {
                return Err(Error::Validation(format!(
                    "{} credentials are not accepted by this platform",
                    credentials.kind()
                )))
            }
        };
        if !token.scope().contains(&requested) {
            return Err(Error::ScopeDenied {
                requested: requested.to_string(),
                granted: token.scope().to_string(),
            });
        }
        log::debug!("authenticated with {} credentials", credentials.kind());
        self.token.set(token.clone());
        Ok(token)
    }

    /// Exchanges a user name and password for an access token.
    pub fn get_access_token(
        &self,
        user: &str,
        password: &str,
        scope: &str,
    ) -> Result<AccessToken, Error> {
        let url = self.build_url(&["vedauth", "authorize", "oauth"])?;
        let body = AuthorizeRequest {
            client_id: &self.client_id,
            username: user,
            password,
            scope,
        };
        let resp = self.http.post(url).json(&body).send()?;
        self.read_token(resp, scope)
    }

    /// Exchanges a refresh token for a new access token.
    pub fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessToken, Error> {
        let url = self.build_url(&["vedauth", "authorize", "token"])?;
        let body = RefreshRequest {
            client_id: &self.client_id,
            refresh_token,
        };
        let resp = self.http.post(url).json(&body).send()?;
        self.read_token(resp, "")
    }

    /// Revokes the held access token and forgets it.
    pub fn revoke_access_token(&self) -> Result<(), Error> {
        let Some(token) = self.token.clear() else {
            return Ok(());
        };
        let url = self.build_url(&["vedauth", "revoke", "token"])?;
        let resp = self.http.get(url).bearer_auth(token.token()).send()?;
        match resp.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            _ => self.parse_error(resp),
        }
    }

    /// Used by the token store; must not touch the store itself.
    pub(super) fn refresh_with(&self, expired: &AccessToken) -> Result<AccessToken, Error> {
        let refresh_token = expired.refresh_token().ok_or_else(|| {
            Error::NotAuthenticated("access token expired and cannot be refreshed".to_string())
        })?;
        let refreshed = self.refresh_access_token(refresh_token)?;
        if refreshed.scope().is_empty() {
            // The refresh grant does not always echo the scope.
            return Ok(refreshed.with_scope(expired.scope().clone()));
        }
        Ok(refreshed)
    }

    fn read_token(&self, resp: Response, requested_scope: &str) -> Result<AccessToken, Error> {
        match resp.status() {
            StatusCode::OK => {
                let body = resp.json::<TokenResponse>()?;
                Ok(token_from_response(body, requested_scope))
            }
            _ => Err(auth_error(resp, requested_scope)),
        }
    }
}

fn token_from_response(body: TokenResponse, requested_scope: &str) -> AccessToken {
    let scope = body
        .scope
        .as_deref()
        .map(Scope::parse)
        .unwrap_or_else(|| Scope::parse(requested_scope));
    let mut token = AccessToken::new(body.access_token, scope).with_identity(body.identity);
    let expires_at = body.expires.and_then(unix_to_system_time).or_else(|| {
        body.expires_in
            .and_then(|secs| u64::try_from(secs).ok())
            .map(|secs| SystemTime::now() + Duration::from_secs(secs))
    });
    if let Some(expires_at) = expires_at {
        token = token.with_expiry(expires_at);
    }
    if let Some(refresh_token) = body.refresh_token.filter(|t| !t.is_empty()) {
        token = token.with_refresh(
            refresh_token,
            body.refresh_until.and_then(unix_to_system_time),
        );
    }
    token
}

/// OAuth endpoints answer bad credentials with 400 and `invalid_grant`, so
/// every failure other than a denied scope is an authentication failure.
fn auth_error(mut resp: Response, requested_scope: &str) -> Error {
    let status = resp.status();
    if status.is_server_error() {
        return common::read_error(resp, parse_error_payload);
    }
    let body = read_body_with_limit(&mut resp, MAX_ERROR_BODY_BYTES);
    let oauth = serde_json::from_slice::<OAuthError>(&body).unwrap_or_default();
    if oauth.error.as_deref() == Some("invalid_scope") {
        return Error::ScopeDenied {
            requested: requested_scope.to_string(),
            granted: String::new(),
        };
    }
    let message = oauth
        .error_description
        .clone()
        .unwrap_or_else(|| fallback_message(status, &body));
    Error::Authentication(ApiError {
        status: status.as_u16(),
        code: None,
        message,
        description: oauth.error,
    })
}
