//! In-memory certificate authority for tests and offline use.
//!
//! Issues real OpenSSH user certificates signed by a CA key generated when
//! the connection is built. Pending rounds, rejections and credentials are
//! configurable through [`FakeConnectionBuilder`].

mod authority;

use crate::auth::{AccessToken, Credentials, Scope, TokenStore, SCOPE_SSH};
use crate::connection::common::InFlight;
use crate::connection::Connection;
use crate::error::{ApiError, Error};
use crate::models::{
    IssuedMaterial, SshCertRequest, SshConfigRequest, SshConfigResponse, SshRetrieveResponse,
};
use crate::poller::{PollOutcome, PollPolicy, RetrievalPoller};
use authority::CertificateAuthority;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Clone, Default)]
pub struct FakeConnectionBuilder {
    poll_policy: PollPolicy,
    pending_rounds: u32,
    always_pending: bool,
    rejected_cadns: HashSet<String>,
    user: Option<(String, String)>,
    api_keys: HashSet<String>,
    refresh_tokens: HashSet<String>,
    granted_scope: Option<String>,
    default_principals: Vec<String>,
}

impl FakeConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Number of retrieval attempts answered with "pending" before issuing.
    pub fn pending_rounds(mut self, rounds: u32) -> Self {
        self.pending_rounds = rounds;
        self
    }

    /// Never issue; every retrieval reports pending.
    pub fn always_pending(mut self, value: bool) -> Self {
        self.always_pending = value;
        self
    }

    /// Requests against this CA template are declined.
    pub fn reject_cadn(mut self, cadn: impl Into<String>) -> Self {
        self.rejected_cadns.insert(cadn.into());
        self
    }

    /// Only this user name and password authenticate. Any non-empty
    /// credential is accepted while nothing is configured.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some((user.into(), password.into()));
        self
    }

    /// Accepts this API key. Once any credential is configured, only the
    /// configured ones authenticate.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.insert(key.into());
        self
    }

    /// Accepts this refresh token, with the same rules as [`Self::api_key`].
    pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_tokens.insert(token.into());
        self
    }

    fn restricted(&self) -> bool {
        self.user.is_some() || !self.api_keys.is_empty() || !self.refresh_tokens.is_empty()
    }

    /// Scope granted on authentication instead of the requested one.
    pub fn granted_scope(mut self, scope: impl Into<String>) -> Self {
        self.granted_scope = Some(scope.into());
        self
    }

    pub fn default_principals<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_principals = principals.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<FakeConnection, Error> {
        Ok(FakeConnection {
            ca: CertificateAuthority::generate()?,
            config: self,
            token: TokenStore::new(),
            in_flight: InFlight::default(),
            records: Mutex::new(HashMap::new()),
            serial: AtomicU64::new(1),
        })
    }
}

struct Record {
    request: SshCertRequest,
    pending_left: u32,
    issued: Option<IssuedMaterial>,
    retired: bool,
}

pub struct FakeConnection {
    ca: CertificateAuthority,
    config: FakeConnectionBuilder,
    token: TokenStore,
    in_flight: InFlight,
    records: Mutex<HashMap<String, Record>>,
    serial: AtomicU64,
}

impl FakeConnection {
    pub fn builder() -> FakeConnectionBuilder {
        FakeConnectionBuilder::new()
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.token.current()
    }

    /// OpenSSH public key of the ephemeral CA, for verifying issued certificates.
    pub fn ca_public_key(&self) -> Result<String, Error> {
        self.ca.public_key()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ssh_token(&self) -> Result<AccessToken, Error> {
        self.token.usable(&Scope::parse(SCOPE_SSH), |_| {
            Err(Error::NotAuthenticated(
                "fake tokens cannot be refreshed; authenticate again".to_string(),
            ))
        })
    }

    fn issue_token(&self, requested: &Scope) -> Result<AccessToken, Error> {
        let granted = match self.config.granted_scope {
            Some(ref scope) => Scope::parse(scope),
            None => requested.clone(),
        };
        if !granted.contains(requested) {
            return Err(Error::ScopeDenied {
                requested: requested.to_string(),
                granted: granted.to_string(),
            });
        }
        let id = self.serial.fetch_add(1, Ordering::Relaxed);
        Ok(AccessToken::new(format!("fake-token-{id}"), granted)
            .with_expiry(SystemTime::now() + TOKEN_LIFETIME))
    }

    fn retrieve_once(&self, request: &SshCertRequest) -> Result<PollOutcome<SshRetrieveResponse>, Error> {
        let mut records = self.records();
        let record = records
            .get_mut(request.key_id())
            .filter(|record| !record.retired)
            .ok_or_else(|| Error::NotFound(request.key_id().to_string()))?;
        if self.config.always_pending {
            return Ok(PollOutcome::Pending(Some("Pending Issue".to_string())));
        }
        if record.pending_left > 0 {
            record.pending_left -= 1;
            return Ok(PollOutcome::Pending(Some("Pending Issue".to_string())));
        }
        let material = match record.issued.clone() {
            Some(material) => material,
            None => {
                let serial = self.serial.fetch_add(1, Ordering::Relaxed);
                let material = self.ca.issue(&record.request, serial)?;
                log::info!("fake ca issued certificate {serial} for key id {}", request.key_id());
                record.issued = Some(material.clone());
                material
            }
        };
        material.into_response(request).map(PollOutcome::Issued)
    }
}

impl Connection for FakeConnection {
    fn authenticate(&self, credentials: &Credentials, scope: &str) -> Result<AccessToken, Error> {
        self.token.clear();
        let requested = Scope::parse(scope);
        let token = match credentials {
            Credentials::UserPassword { user, password } => {
                let accepted = match self.config.user {
                    Some((ref expected_user, ref expected_password)) => {
                        user == expected_user && password == expected_password
                    }
                    None => !self.config.restricted() && !user.is_empty() && !password.is_empty(),
                };
                if !accepted {
                    return Err(Error::Authentication(ApiError::new(
                        StatusCode::BAD_REQUEST,
                        "Username/password combination not valid",
                    )));
                }
                self.issue_token(&requested)?
            }
            Credentials::RefreshToken(secret) | Credentials::ApiKey(secret) => {
                let accepted = match credentials {
                    Credentials::ApiKey(_) => &self.config.api_keys,
                    _ => &self.config.refresh_tokens,
                };
                let valid = !secret.is_empty()
                    && (accepted.contains(secret) || !self.config.restricted());
                if !valid {
                    return Err(Error::Authentication(ApiError::new(
                        StatusCode::UNAUTHORIZED,
                        format!("{} not valid", credentials.kind()),
                    )));
                }
                self.issue_token(&requested)?
            }
            Credentials::AccessToken { token, scope: granted } => {
                let granted = Scope::parse(granted);
                if !granted.contains(&requested) {
                    return Err(Error::ScopeDenied {
                        requested: requested.to_string(),
                        granted: granted.to_string(),
                    });
                }
                AccessToken::new(token.clone(), granted)
            }
        };
        self.token.set(token.clone());
        Ok(token)
    }

    fn request_ssh_cert(&self, request: &mut SshCertRequest) -> Result<bool, Error> {
        request.validate()?;
        self.ssh_token()?;
        let _guard = self.in_flight.claim(request.key_id())?;
        if self.config.rejected_cadns.contains(request.cadn()) {
            log::debug!("fake ca declined key id {}", request.key_id());
            return Ok(false);
        }
        request.record_submission(Some(format!("fake:{}", request.object_name_or_key_id())), None);
        self.records().insert(
            request.key_id().to_string(),
            Record {
                request: request.clone(),
                pending_left: self.config.pending_rounds,
                issued: None,
                retired: false,
            },
        );
        Ok(true)
    }

    fn retrieve_ssh_cert(&self, request: &SshCertRequest) -> Result<SshRetrieveResponse, Error> {
        self.ssh_token()?;
        let mut policy = self.config.poll_policy;
        if let Some(timeout) = request.timeout {
            policy = policy.with_deadline(timeout);
        }
        RetrievalPoller::new(policy).run(request.key_id(), |_| self.retrieve_once(request))
    }

    fn renew_ssh_cert(&self, request: &mut SshCertRequest) -> Result<bool, Error> {
        self.ssh_token()?;
        let _guard = self.in_flight.claim(request.key_id())?;
        let mut records = self.records();
        let record = records
            .get_mut(request.key_id())
            .filter(|record| !record.retired)
            .ok_or_else(|| Error::NotFound(request.key_id().to_string()))?;
        record.issued = None;
        record.pending_left = self.config.pending_rounds;
        Ok(true)
    }

    fn retire_ssh_cert(&self, request: &SshCertRequest) -> Result<(), Error> {
        self.ssh_token()?;
        if let Some(record) = self.records().get_mut(request.key_id()) {
            record.retired = true;
        }
        Ok(())
    }

    fn retrieve_ssh_config(&self, request: &SshConfigRequest) -> Result<SshConfigResponse, Error> {
        request.validate()?;
        Ok(SshConfigResponse {
            ca_public_key: self.ca.public_key()?,
            principals: self.config.default_principals.clone(),
        })
    }
}
