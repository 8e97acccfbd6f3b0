use super::CloudConnection;
use crate::auth::AccessToken;
use crate::error::Error;
use crate::models::cloud::{
    RequestState, SshCertificate, SshCertificateRequest, SshRequestStatus, SshRetrieveRequest,
    SshTemplate,
};
use crate::models::{
    IssuedMaterial, SshCertRequest, SshConfigRequest, SshConfigResponse, SshRetrieveResponse,
};
use crate::poller::{PollOutcome, RetrievalPoller};
use reqwest::StatusCode;

const REQUESTS: &str = "sshcertificaterequests";

impl CloudConnection {
    pub(super) fn submit_ssh_request(&self, request: &mut SshCertRequest) -> Result<bool, Error> {
        request.validate()?;
        let token = self.ssh_token()?;
        let _guard = self.in_flight.claim(request.key_id())?;

        let body = SshCertificateRequest {
            issuing_template: request.cadn().to_string(),
            key_id: request.key_id().to_string(),
            validity_period: request.validity_period.clone(),
            principals: request.principals.clone(),
            source_addresses: request.source_addresses.clone(),
            destination_addresses: request.destination_addresses.clone(),
            extensions: request.extensions.clone(),
            force_command: request.force_command.clone(),
            public_key: request.public_key_data().map(str::to_owned),
        };
        let url = self.build_url(&["v1", REQUESTS])?;
        log::debug!("submitting ssh certificate request for key id {}", request.key_id());
        let resp = self.apply_auth(self.http.post(url).json(&body), &token).send()?;
        let status: SshRequestStatus =
            self.expect_json(resp, &[StatusCode::CREATED, StatusCode::OK])?;
        Ok(accept(request, status))
    }

    pub(super) fn renew_ssh_request(&self, request: &mut SshCertRequest) -> Result<bool, Error> {
        let token = self.ssh_token()?;
        let _guard = self.in_flight.claim(request.key_id())?;
        let url = self.build_url(&["v1", REQUESTS, request_id(request), "renewal"])?;
        let resp = self.apply_auth(self.http.post(url), &token).send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(request.key_id().to_string()));
        }
        let status: SshRequestStatus =
            self.expect_json(resp, &[StatusCode::CREATED, StatusCode::OK])?;
        Ok(accept(request, status))
    }

    pub(super) fn retrieve_ssh_request(
        &self,
        request: &SshCertRequest,
    ) -> Result<SshRetrieveResponse, Error> {
        self.ssh_token()?;
        let mut policy = self.poll_policy;
        if let Some(timeout) = request.timeout {
            policy = policy.with_deadline(timeout);
        }
        RetrievalPoller::new(policy).run(request.key_id(), |_| {
            let token = self.ssh_token()?;
            self.retrieve_once(request, &token)
        })
    }

    pub(super) fn retire_ssh_request(&self, request: &SshCertRequest) -> Result<(), Error> {
        let token = self.ssh_token()?;
        let url = self.build_url(&["v1", REQUESTS, request_id(request)])?;
        let resp = self.apply_auth(self.http.delete(url), &token).send()?;
        match resp.status() {
            StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
            _ => self.parse_error(resp),
        }
    }

    pub(super) fn retrieve_template(
        &self,
        request: &SshConfigRequest,
    ) -> Result<SshConfigResponse, Error> {
        request.validate()?;
        let name = request
            .guid
            .as_deref()
            .or(request.cadn.as_deref())
            .unwrap_or_default();
        let url = self.build_url(&["v1", "sshissuingtemplates", name])?;
        let mut req = self.http.get(url);
        if let Some(token) = self.token.current() {
            req = self.apply_auth(req, &token);
        }
        let resp = req.send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(name.to_string()));
        }
        let template: SshTemplate = self.expect_json(resp, &[StatusCode::OK])?;
        Ok(SshConfigResponse {
            ca_public_key: template.ca_public_key,
            principals: template.default_principals,
        })
    }

    fn retrieve_once(
        &self,
        request: &SshCertRequest,
        token: &AccessToken,
    ) -> Result<PollOutcome<SshRetrieveResponse>, Error> {
        let url = self.build_url(&["v1", REQUESTS, request_id(request), "retrieval"])?;
        let body = SshRetrieveRequest {
            include_private_key: request.is_service_generated(),
            private_key_passphrase: request.private_key_passphrase().map(str::to_owned),
            include_certificate_details: request.include_cert_details,
        };
        let resp = self.apply_auth(self.http.post(url).json(&body), token).send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(request.key_id().to_string()));
        }
        let certificate: SshCertificate =
            self.expect_json(resp, &[StatusCode::OK, StatusCode::ACCEPTED])?;
        classify_retrieval(request, certificate)
    }
}

/// The service-assigned request id once known, the key id before that.
fn request_id(request: &SshCertRequest) -> &str {
    request.pickup_id().unwrap_or(request.key_id())
}

fn accept(request: &mut SshCertRequest, status: SshRequestStatus) -> bool {
    match status.status {
        RequestState::Rejected | RequestState::Failed => {
            log::debug!(
                "cloud service declined key id {}: {}",
                request.key_id(),
                status.failure_reason.as_deref().unwrap_or("no reason given")
            );
            false
        }
        _ => {
            request.record_submission(status.id, None);
            true
        }
    }
}

fn classify_retrieval(
    request: &SshCertRequest,
    certificate: SshCertificate,
) -> Result<PollOutcome<SshRetrieveResponse>, Error> {
    match certificate.status {
        RequestState::Issued => {
            let material = IssuedMaterial {
                cert_data: certificate.certificate,
                public_key_data: certificate.public_key,
                private_key_data: certificate.private_key,
                certificate_details: certificate.certificate_details,
                cadn: certificate.issuing_template,
                ca_guid: None,
            };
            material.into_response(request).map(PollOutcome::Issued)
        }
        RequestState::Rejected | RequestState::Failed => Ok(PollOutcome::Failed(
            certificate
                .failure_reason
                .unwrap_or_else(|| "request was rejected".to_string()),
        )),
        RequestState::Retired => Ok(PollOutcome::Failed("certificate was retired".to_string())),
        RequestState::Requested | RequestState::Pending | RequestState::Unknown => {
            Ok(PollOutcome::Pending(Some(format!("{:?}", certificate.status))))
        }
    }
}
