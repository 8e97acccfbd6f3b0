use super::{CloudConnection, API_KEY_HEADER};
use crate::auth::{AccessToken, Credentials, Scope, TokenKind};
use crate::error::Error;
use crate::models::cloud::UserAccount;
use reqwest::StatusCode;

impl CloudConnection {
    pub(super) fn authenticate_with(
        &self,
        credentials: &Credentials,
        scope: &str,
    ) -> Result<AccessToken, Error> {
        self.token.clear();
        let token = match credentials {
            Credentials::ApiKey(api_key) => {
                let account = self.get_user_account(api_key)?;
                AccessToken::new(api_key.clone(), Scope::parse(scope))
                    .with_kind(TokenKind::ApiKey)
                    .with_identity(account.user.and_then(|u| u.username))
            }
            Credentials::AccessToken { token, scope: granted } => {
                let granted = Scope::parse(granted);
                let requested = Scope::parse(scope);
                if !granted.contains(&requested) {
                    return Err(Error::ScopeDenied {
                        requested: requested.to_string(),
                        granted: granted.to_string(),
                    });
                }
                AccessToken::new(token.clone(), granted)
            }
            Credentials::UserPassword { .. } | Credentials::RefreshToken(_) => {
                return Err(Error::Validation(format!(
                    "{} credentials are not accepted by the cloud service",
                    credentials.kind()
                )))
            }
        };
        log::debug!("authenticated with {} credentials", credentials.kind());
        self.token.set(token.clone());
        Ok(token)
    }

    /// Validates an API key by reading the account it belongs to.
    fn get_user_account(&self, api_key: &str) -> Result<UserAccount, Error> {
        let url = self.build_url(&["v1", "useraccounts"])?;
        let resp = self.http.get(url).header(API_KEY_HEADER, api_key).send()?;
        match resp.status() {
            StatusCode::OK => resp.json::<UserAccount>().map_err(Error::from),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                match self.parse_error::<UserAccount>(resp) {
                    Err(Error::Authorization(api)) | Err(Error::Authentication(api)) => {
                        Err(Error::Authentication(api))
                    }
                    other => other,
                }
            }
            _ => self.parse_error(resp),
        }
    }
}
