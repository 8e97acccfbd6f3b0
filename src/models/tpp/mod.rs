mod auth;
mod ssh;

pub(crate) use auth::{AuthorizeRequest, OAuthError, RefreshRequest, TokenResponse};
pub(crate) use ssh::{
    ObjectRequest, ResponseStatus, SshCertificateRequest, SshCertificateResponse,
    SshRetrieveRequest, SshRetrieveResponse, SshTemplateResponse,
};
