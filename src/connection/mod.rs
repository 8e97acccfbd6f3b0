pub(crate) mod common;
mod transport;

use crate::auth::{AccessToken, Credentials};
use crate::cloud::CloudConnection;
use crate::error::Error;
use crate::fake::FakeConnection;
use crate::models::{SshCertRequest, SshConfigRequest, SshConfigResponse, SshRetrieveResponse};
use crate::poller::PollPolicy;
use crate::tpp::TppConnection;

pub use transport::TransportOptions;

/// Capability set shared by every certificate authority backend.
///
/// Implementations are thread safe; one connection may serve concurrent
/// requests as long as each uses its own key id.
pub trait Connection: Send + Sync {
    /// Exchanges credentials for an access token and keeps it for later calls.
    fn authenticate(&self, credentials: &Credentials, scope: &str) -> Result<AccessToken, Error>;

    /// Submits the request; `Ok(true)` means the authority accepted it for processing.
    fn request_ssh_cert(&self, request: &mut SshCertRequest) -> Result<bool, Error>;

    /// Retrieves the certificate for a previously accepted request, polling
    /// while issuance is pending.
    fn retrieve_ssh_cert(&self, request: &SshCertRequest) -> Result<SshRetrieveResponse, Error>;

    /// Re-issues the certificate under the same key id.
    fn renew_ssh_cert(&self, request: &mut SshCertRequest) -> Result<bool, Error>;

    /// Revokes the certificate and clears authority-side state. Retiring an
    /// unknown or already retired key id succeeds.
    fn retire_ssh_cert(&self, request: &SshCertRequest) -> Result<(), Error>;

    /// Looks up the CA public key and default principals of a CA template.
    fn retrieve_ssh_config(&self, request: &SshConfigRequest) -> Result<SshConfigResponse, Error>;
}

/// Available authority backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Token-authenticated enterprise platform.
    Tpp,
    /// Cloud service.
    Cloud,
    /// In-memory authority; the endpoint is ignored.
    Fake,
}

/// Constructs an unauthenticated connection for `backend`.
pub fn connect(
    backend: Backend,
    endpoint: &str,
    transport: TransportOptions,
    poll_policy: PollPolicy,
) -> Result<Box<dyn Connection>, Error> {
    let connection: Box<dyn Connection> = match backend {
        Backend::Tpp => Box::new(
            TppConnection::builder(endpoint)?
                .transport(transport)
                .poll_policy(poll_policy)
                .build()?,
        ),
        Backend::Cloud => Box::new(
            CloudConnection::builder(endpoint)?
                .transport(transport)
                .poll_policy(poll_policy)
                .build()?,
        ),
        Backend::Fake => Box::new(FakeConnection::builder().poll_policy(poll_policy).build()?),
    };
    Ok(connection)
}
