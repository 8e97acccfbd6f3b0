mod auth;
mod ssh;

pub(crate) use auth::{CloudErrors, UserAccount};
pub(crate) use ssh::{
    RequestState, SshCertificate, SshCertificateRequest, SshRequestStatus, SshRetrieveRequest,
    SshTemplate,
};
