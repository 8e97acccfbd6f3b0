#![forbid(unsafe_code)]

mod auth;
mod build_url;
mod client_defaults;
mod cloud;
mod connection;
mod error;
mod fake;
mod keygen;
mod models;
mod poller;
#[cfg(test)]
mod test_support;
mod tpp;

pub use error::{ApiError, Error};

pub use auth::{AccessToken, Credentials, Scope, SCOPE_SSH};

pub use connection::{connect, Backend, Connection, TransportOptions};

pub use keygen::{
    generate_ssh_keypair, KeyAlgorithm, KeyPair, KeyPairGenerator, MAX_RSA_BITS, MIN_RSA_BITS,
};

pub use models::{
    parse_validity_period, SshCertRequest, SshCertRequestBuilder, SshCertificateDetails,
    SshConfigRequest, SshConfigResponse, SshRetrieveResponse,
};

pub use poller::{Backoff, PollOutcome, PollPolicy, PollState, RetrievalPoller};

pub use cloud::{CloudConnection, CloudConnectionBuilder};
pub use fake::{FakeConnection, FakeConnectionBuilder};
pub use tpp::{TppConnection, TppConnectionBuilder};
