use crate::client_defaults::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::error::Error;
use reqwest::blocking::Client as HttpClient;
use reqwest::Certificate;
use std::path::Path;
use std::time::Duration;

/// HTTP settings shared by every backend.
///
/// Redirects are never followed: every request carries credentials.
#[derive(Clone)]
pub struct TransportOptions {
    timeout: Option<Duration>,
    ca_certs: Vec<Certificate>,
    user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            ca_certs: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Trusts every certificate in a PEM bundle in addition to the built-in roots.
    pub fn add_ca_cert_pem(mut self, ca_pem: &[u8]) -> Result<Self, Error> {
        let certs = Certificate::from_pem_bundle(ca_pem)?;
        if certs.is_empty() {
            return Err(Error::Config(
                "config error: CA bundle contains no certificates".to_string(),
            ));
        }
        self.ca_certs.extend(certs);
        Ok(self)
    }

    pub fn ca_bundle_path(self, path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            Error::Config(format!(
                "config error: cannot read CA bundle {}: {e}",
                path.display()
            ))
        })?;
        self.add_ca_cert_pem(&pem)
    }

    pub(crate) fn build_client(&self) -> Result<HttpClient, Error> {
        let mut builder = HttpClient::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(self.user_agent.clone());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        for cert in &self.ca_certs {
            builder = builder.add_root_certificate(cert.clone());
        }
        Ok(builder.build()?)
    }
}

impl std::fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportOptions")
            .field("timeout", &self.timeout)
            .field("ca_certs", &self.ca_certs.len())
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
