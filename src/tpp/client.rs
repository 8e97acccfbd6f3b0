use crate::auth::{AccessToken, Credentials, Scope, TokenStore, SCOPE_SSH};
use crate::build_url::BuildUrlOptions;
use crate::connection::common::{self, InFlight};
use crate::connection::{Connection, TransportOptions};
use crate::error::{ApiError, Error};
use crate::models::{SshCertRequest, SshConfigRequest, SshConfigResponse, SshRetrieveResponse};
use crate::poller::PollPolicy;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::StatusCode;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

mod auth;
mod ssh;

const DEFAULT_CLIENT_ID: &str = "vcert-sdk";

pub struct TppConnectionBuilder {
    base_url: Url,
    transport: TransportOptions,
    poll_policy: PollPolicy,
    client_id: String,
}

impl TppConnectionBuilder {
    /// Accepts the platform's root URL; a trailing `vedsdk` or `vedauth`
    /// segment is stripped so either API root may be passed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, Error> {
        let base_url = normalize_base_url(common::parse_base_url(base_url.as_ref())?)?;
        Ok(Self {
            base_url,
            transport: TransportOptions::default(),
            poll_policy: PollPolicy::default(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
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

    /// OAuth client id registered on the platform for this application.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn build(self) -> Result<TppConnection, Error> {
        let http = self.transport.build_client()?;
        Ok(TppConnection {
            base_url: self.base_url,
            http,
            client_id: self.client_id,
            poll_policy: self.poll_policy,
            token: TokenStore::new(),
            in_flight: InFlight::default(),
        })
    }
}

/// Connection to a token-authenticated enterprise platform.
pub struct TppConnection {
    base_url: Url,
    http: HttpClient,
    client_id: String,
    poll_policy: PollPolicy,
    token: TokenStore,
    in_flight: InFlight,
}

impl TppConnection {
    pub fn builder(base_url: impl AsRef<str>) -> Result<TppConnectionBuilder, Error> {
        TppConnectionBuilder::new(base_url)
    }

    /// The token currently held by this connection.
    pub fn access_token(&self) -> Option<AccessToken> {
        self.token.current()
    }

    fn build_url(&self, segments: &[&str]) -> Result<Url, Error> {
        common::build_url(&self.base_url, segments, BuildUrlOptions::REQUEST)
    }

    /// A token valid for SSH operations, refreshed first when it has expired.
    fn ssh_token(&self) -> Result<AccessToken, Error> {
        self.token
            .usable(&Scope::parse(SCOPE_SSH), |old| self.refresh_with(old))
    }

    fn post_json<B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
        token: &AccessToken,
    ) -> Result<Response, Error> {
        let url = self.build_url(segments)?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token.token())
            .json(body)
            .send()?;
        Ok(resp)
    }

    fn expect_ok_json<T: serde::de::DeserializeOwned>(&self, resp: Response) -> Result<T, Error> {
        if resp.status() == StatusCode::OK {
            resp.json::<T>().map_err(Error::from)
        } else {
            self.parse_error(resp)
        }
    }

    fn parse_error<T>(&self, resp: Response) -> Result<T, Error> {
        Err(common::read_error(resp, parse_error_payload))
    }
}

impl Connection for TppConnection {
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
        self.retrieve_ca_config(request)
    }
}

fn normalize_base_url(mut url: Url) -> Result<Url, Error> {
    let raw = url.to_string();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| Error::InvalidBaseUrl(raw.clone()))?;
        segments.pop_if_empty();
    }
    let last = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .map(str::to_ascii_lowercase);
    if matches!(last.as_deref(), Some("vedsdk") | Some("vedauth")) {
        url.path_segments_mut()
            .map_err(|_| Error::InvalidBaseUrl(raw))?
            .pop();
    }
    Ok(url)
}

/// Understands both the OAuth error shape and the SDK's `Error` field.
fn parse_error_payload(status: StatusCode, body: &[u8]) -> Option<ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let text = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_owned);
    let message = text("error_description")
        .or_else(|| text("Error"))
        .or_else(|| text("ErrorMessage"))
        .or_else(|| text("error"))?;
    Some(ApiError {
        status: status.as_u16(),
        code: value
            .get("ErrorCode")
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok()),
        message,
        description: text("error"),
    })
}

#[cfg(test)]
mod tests;
