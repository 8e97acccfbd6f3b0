use std::fmt;

/// Material exchanged for an [`AccessToken`](super::AccessToken).
#[derive(Clone)]
pub enum Credentials {
    UserPassword { user: String, password: String },
    /// A token issued out of band, together with the scope it was granted.
    AccessToken { token: String, scope: String },
    RefreshToken(String),
    ApiKey(String),
}

impl Credentials {
    pub fn user_password(user: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::UserPassword {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn access_token(token: impl Into<String>, scope: impl Into<String>) -> Self {
        Credentials::AccessToken {
            token: token.into(),
            scope: scope.into(),
        }
    }

    pub fn refresh_token(token: impl Into<String>) -> Self {
        Credentials::RefreshToken(token.into())
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Credentials::ApiKey(key.into())
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Credentials::UserPassword { .. } => "user/password",
            Credentials::AccessToken { .. } => "access token",
            Credentials::RefreshToken(_) => "refresh token",
            Credentials::ApiKey(_) => "api key",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::UserPassword { user, .. } => f
                .debug_struct("UserPassword")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::AccessToken { scope, .. } => f
                .debug_struct("AccessToken")
                .field("token", &"<redacted>")
                .field("scope", scope)
                .finish(),
            Credentials::RefreshToken(_) => f.write_str("RefreshToken(<redacted>)"),
            Credentials::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}
