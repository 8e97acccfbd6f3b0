use crate::auth::{AccessToken, Credentials, Scope, TokenKind, TokenStore, SCOPE_SSH};
use crate::build_url::BuildUrlOptions;
use crate::connection::common::{self, InFlight};
use crate::connection::{Connection, TransportOptions};
use crate::error::{ApiError, Error};
use crate::models::cloud::CloudErrors;
use crate::models::{SshCertRequest, SshConfigRequest, SshConfigResponse, SshRetrieveResponse};
use crate::poller::PollPolicy;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use url::Url;

mod auth;
mod ssh;

const API_KEY_HEADER: &str = "tppl-api-key";

pub struct CloudConnectionBuilder {
    base_url: Url,
    transport: TransportOptions,
    poll_policy: PollPolicy,
}

impl CloudConnectionBuilder {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, Error> {
        Ok(Self {
            base_url: common::parse_base_url(base_url.as_ref())?,
            transport: TransportOptions::default(),
            poll_policy: PollPolicy::default(),
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.timeout(timeout);
        self
    }

    pub fn add_ca_cert_pem(mut self, ca_pem: &[u8]) -> Result<Self, Error> {
        self.transport = self.transport.add_ca_cert_pem(ca_pem)?;
        Ok(self)
    }

    pub fn ca_bundle_path(mut self, path: impl AsRef<Path>) -> Result<Self, Error> {
        self.transport = self.transport.ca_bundle_path(path)?;
        Ok(self)
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.transport = self.transport.user_agent(user_agent);
        self
    }

    pub fn transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn build(self) -> Result<CloudConnection, Error> {
        Ok(CloudConnection {
            http: self.transport.build_client()?,
            base_url: self.base_url,
            poll_policy: self.poll_policy,
            token: TokenStore::new(),
            in_flight: InFlight::default(),
        })
    }
}

/// Connection to the cloud issuance service.
pub struct CloudConnection {
    base_url: Url,
    http: HttpClient,
    poll_policy: PollPolicy,
    token: TokenStore,
    in_flight: InFlight,
}

impl CloudConnection {
    pub fn builder(base_url: impl AsRef<str>) -> Result<CloudConnectionBuilder, Error> {
        CloudConnectionBuilder::new(base_url)
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.token.current()
    }

    fn build_url(&self, segments: &[&str]) -> Result<Url, Error> {
        common::build_url(&self.base_url, segments, BuildUrlOptions::REQUEST)
    }

    /// Cloud credentials do not expire on a schedule the client knows about,
    /// so there is nothing to refresh.
    fn ssh_token(&self) -> Result<AccessToken, Error> {
        self.token.usable(&Scope::parse(SCOPE_SSH), |_| {
            Err(Error::NotAuthenticated(
                "cloud credentials cannot be refreshed; authenticate again".to_string(),
            ))
        })
    }

    fn apply_auth(&self, req: RequestBuilder, token: &AccessToken) -> RequestBuilder {
        match token.kind {
            TokenKind::ApiKey => req.header(API_KEY_HEADER, token.token()),
            TokenKind::Bearer => req.bearer_auth(token.token()),
        }
    }

    fn expect_json<T: serde::de::DeserializeOwned>(
        &self,
        resp: Response,
        accepted: &[StatusCode],
    ) -> Result<T, Error> {
        if accepted.contains(&resp.status()) {
            resp.json::<T>().map_err(Error::from)
        } else {
            self.parse_error(resp)
        }
    }

    fn parse_error<T>(&self, resp: Response) -> Result<T, Error> {
        Err(common::read_error(resp, parse_error_payload))
    }
}

impl Connection for CloudConnection {
    fn authenticate(&self, credentials: &Credentials, scope: &str) -> Result<AccessToken, Error> {
        self.authenticate_with(credentials, scope)
    }

    fn request_ssh_cert(&self, request: &mut SshCertRequest) -> Result<bool, Error> {
        self.submit_ssh_request(request)
    }

    fn retrieve_ssh_cert(&self, request: &SshCertRequest) -> Result<SshRetrieveResponse, Error> {
        self.retrieve_ssh_request(request)
    }

    fn renew_ssh_cert(&self, request: &mut SshCertRequest) -> Result<bool, Error> {
        self.renew_ssh_request(request)
    }

    fn retire_ssh_cert(&self, request: &SshCertRequest) -> Result<(), Error> {
        self.retire_ssh_request(request)
    }

    fn retrieve_ssh_config(&self, request: &SshConfigRequest) -> Result<SshConfigResponse, Error> {
        self.retrieve_template(request)
    }
}

fn parse_error_payload(status: StatusCode, body: &[u8]) -> Option<ApiError> {
    let payload: CloudErrors = serde_json::from_slice(body).ok()?;
    let first = payload.errors.first()?;
    let message = payload
        .errors
        .iter()
        .map(|e| e.message.as_str())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    Some(ApiError {
        status: status.as_u16(),
        code: first.code,
        message,
        description: None,
    })
}

#[cfg(test)]
mod tests;
