use super::TppConnection;
use crate::auth::AccessToken;
use crate::error::{ApiError, Error};
use crate::models::tpp::{
    ObjectRequest, ResponseStatus, SshCertificateRequest, SshCertificateResponse,
    SshRetrieveRequest, SshRetrieveResponse as WireRetrieveResponse, SshTemplateResponse,
};
use crate::models::{
    IssuedMaterial, SshCertRequest, SshConfigRequest, SshConfigResponse, SshRetrieveResponse,
};
use crate::poller::{PollOutcome, RetrievalPoller};
use reqwest::StatusCode;

const DEFAULT_POLICY_DN: &str = "\\VED\\Policy\\Certificates\\SSH Certificates";
const POLICY_ROOT: &str = "\\VED\\Policy\\";
const TEMPLATE_ROOT: &str = "\\VED\\Certificate Authority\\SSH\\Templates\\";

impl TppConnection {
    pub(super) fn submit_ssh_request(&self, request: &mut SshCertRequest) -> Result<bool, Error> {
        request.validate()?;
        let token = self.ssh_token()?;
        let _guard = self.in_flight.claim(request.key_id())?;

        let body = SshCertificateRequest {
            cadn: template_dn(request.cadn()),
            policy_dn: Some(policy_dn(request.policy_dn.as_deref())),
            object_name: Some(request.object_name_or_key_id().to_string()),
            destination_addresses: request.destination_addresses.clone(),
            key_id: request.key_id().to_string(),
            principals: request.principals.clone(),
            validity_period: request.validity_period.clone(),
            public_key_data: request.public_key_data().map(str::to_owned),
            extensions: request.extensions.clone(),
            force_command: request.force_command.clone(),
            source_addresses: request.source_addresses.clone(),
        };
        log::debug!("submitting ssh certificate request for key id {}", request.key_id());
        let resp = self.post_json(&["vedsdk", "SSHCertificates", "request"], &body, &token)?;
        let submitted: SshCertificateResponse = self.expect_ok_json(resp)?;
        accept_submission(request, submitted)
    }

    pub(super) fn renew_ssh_request(&self, request: &mut SshCertRequest) -> Result<bool, Error> {
        let token = self.ssh_token()?;
        let _guard = self.in_flight.claim(request.key_id())?;
        let body = object_request(request);
        log::debug!("renewing ssh certificate for key id {}", request.key_id());
        let resp = self.post_json(&["vedsdk", "SSHCertificates", "renew"], &body, &token)?;
        let renewed: SshCertificateResponse = self.expect_ok_json(resp)?;
        accept_submission(request, renewed)
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
        let body = object_request(request);
        let resp = self.post_json(&["vedsdk", "SSHCertificates", "retire"], &body, &token)?;
        match resp.status() {
            StatusCode::NOT_FOUND => {
                log::debug!("key id {} already retired", request.key_id());
                Ok(())
            }
            StatusCode::OK => {
                let retired: SshCertificateResponse = resp.json()?;
                match retired.response {
                    Some(status) if !status.success && !is_not_found(&status) => {
                        Err(Error::Authority(status_error(status)))
                    }
                    _ => Ok(()),
                }
            }
            _ => self.parse_error(resp),
        }
    }

    /// The CA public key is readable without a token; template principals
    /// are looked up only when the connection is authenticated.
    pub(super) fn retrieve_ca_config(
        &self,
        request: &SshConfigRequest,
    ) -> Result<SshConfigResponse, Error> {
        request.validate()?;
        let object = ObjectRequest {
            dn: request.cadn.as_deref().map(template_dn),
            guid: request.guid.clone(),
        };

        let mut url = self.build_url(&[
            "vedsdk",
            "SSHCertificates",
            "Template",
            "Retrieve",
            "PublicKeyData",
        ])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(ref dn) = object.dn {
                query.append_pair("DN", dn);
            }
            if let Some(ref guid) = object.guid {
                query.append_pair("guid", guid);
            }
        }
        let resp = self.http.get(url).send()?;
        let ca_public_key = match resp.status() {
            StatusCode::OK => resp.text()?.trim().to_string(),
            _ => return self.parse_error(resp),
        };

        let principals = match self.token.current() {
            Some(token) => {
                let resp = self.post_json(
                    &["vedsdk", "SSHCertificates", "Template", "Retrieve"],
                    &object,
                    &token,
                )?;
                let template: SshTemplateResponse = self.expect_ok_json(resp)?;
                if let Some(status) = template.response.filter(|s| !s.success) {
                    return Err(Error::Authority(status_error(status)));
                }
                template
                    .access_control
                    .map(|ac| ac.default_principals)
                    .unwrap_or_default()
            }
            None => Vec::new(),
        };

        Ok(SshConfigResponse {
            ca_public_key,
            principals,
        })
    }

    fn retrieve_once(
        &self,
        request: &SshCertRequest,
        token: &AccessToken,
    ) -> Result<PollOutcome<SshRetrieveResponse>, Error> {
        let object = object_request(request);
        let body = SshRetrieveRequest {
            dn: object.dn,
            guid: object.guid,
            include_private_key_data: request.is_service_generated(),
            private_key_passphrase: request.private_key_passphrase().map(str::to_owned),
            include_certificate_details: request.include_cert_details,
        };
        let resp = self.post_json(&["vedsdk", "SSHCertificates", "retrieve"], &body, token)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(request.key_id().to_string()));
        }
        let retrieved: WireRetrieveResponse = self.expect_ok_json(resp)?;
        classify_retrieval(request, retrieved)
    }
}

fn accept_submission(
    request: &mut SshCertRequest,
    submitted: SshCertificateResponse,
) -> Result<bool, Error> {
    if let Some(status) = submitted.response {
        if !status.success {
            if status.error_message.is_some() || status.error_code.is_some() {
                return Err(Error::Authority(status_error(status)));
            }
            log::debug!("authority declined key id {}", request.key_id());
            return Ok(false);
        }
    }
    if let Some(details) = submitted.processing_details {
        if details.status.as_deref().is_some_and(is_failed_status) {
            log::debug!(
                "authority rejected key id {}: {}",
                request.key_id(),
                details.status_description.as_deref().unwrap_or("no reason given")
            );
            return Ok(false);
        }
    }
    request.record_submission(submitted.dn, submitted.guid);
    Ok(true)
}

/// The pickup id recorded at submission wins, then the GUID, then the
/// DN composed from the policy folder and object name.
fn object_request(request: &SshCertRequest) -> ObjectRequest {
    if let Some(pickup_id) = request.pickup_id() {
        return ObjectRequest {
            dn: Some(pickup_id.to_string()),
            guid: None,
        };
    }
    if let Some(guid) = request.guid() {
        return ObjectRequest {
            dn: None,
            guid: Some(guid.to_string()),
        };
    }
    ObjectRequest {
        dn: Some(format!(
            "{}\\{}",
            policy_dn(request.policy_dn.as_deref()),
            request.object_name_or_key_id()
        )),
        guid: None,
    }
}

fn classify_retrieval(
    request: &SshCertRequest,
    retrieved: WireRetrieveResponse,
) -> Result<PollOutcome<SshRetrieveResponse>, Error> {
    let processing_status = retrieved
        .processing_details
        .as_ref()
        .and_then(|d| d.status.clone());
    if let Some(ref status) = processing_status {
        if is_failed_status(status) {
            let reason = retrieved
                .processing_details
                .and_then(|d| d.status_description)
                .unwrap_or_else(|| status.clone());
            return Ok(PollOutcome::Failed(reason));
        }
    }
    if let Some(status) = retrieved.response.clone() {
        if !status.success {
            if is_not_found(&status) {
                return Err(Error::NotFound(request.key_id().to_string()));
            }
            return Err(Error::Authority(status_error(status)));
        }
    }
    if retrieved
        .certificate_data
        .as_deref()
        .map_or(true, |cert| cert.trim().is_empty())
    {
        return Ok(PollOutcome::Pending(processing_status));
    }

    let material = IssuedMaterial {
        cert_data: retrieved.certificate_data,
        public_key_data: retrieved.public_key_data,
        private_key_data: retrieved.private_key_data,
        certificate_details: retrieved.certificate_details.map(Into::into),
        cadn: retrieved.cadn,
        ca_guid: retrieved.ca_guid,
    };
    material.into_response(request).map(PollOutcome::Issued)
}

fn template_dn(cadn: &str) -> String {
    if is_ved_dn(cadn) {
        cadn.to_string()
    } else {
        format!("{TEMPLATE_ROOT}{cadn}")
    }
}

fn policy_dn(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => DEFAULT_POLICY_DN.to_string(),
        Some(dn) if is_ved_dn(dn) => dn.to_string(),
        Some(dn) => format!("{POLICY_ROOT}{}", dn.trim_start_matches('\\')),
    }
}

fn is_ved_dn(dn: &str) -> bool {
    dn.get(..4).is_some_and(|root| root.eq_ignore_ascii_case("\\VED"))
}

fn is_failed_status(status: &str) -> bool {
    let status = status.to_ascii_lowercase();
    ["reject", "fail", "denied", "revoked"]
        .iter()
        .any(|marker| status.contains(marker))
}

fn is_not_found(status: &ResponseStatus) -> bool {
    status.error_message.as_deref().is_some_and(|message| {
        let message = message.to_ascii_lowercase();
        message.contains("not found") || message.contains("does not exist")
    })
}

fn status_error(status: ResponseStatus) -> ApiError {
    ApiError {
        status: StatusCode::OK.as_u16(),
        code: status.error_code,
        message: status
            .error_message
            .unwrap_or_else(|| "request was not successful".to_string()),
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_dn_prefixes_short_names() {
        assert_eq!(
            template_dn("CA1"),
            "\\VED\\Certificate Authority\\SSH\\Templates\\CA1"
        );
        assert_eq!(template_dn("\\VED\\Custom\\CA1"), "\\VED\\Custom\\CA1");
        assert_eq!(template_dn("\\ved\\Custom\\CA1"), "\\ved\\Custom\\CA1");
    }

    #[test]
    fn policy_dn_defaults_and_prefixes() {
        assert_eq!(policy_dn(None), DEFAULT_POLICY_DN);
        assert_eq!(policy_dn(Some("  ")), DEFAULT_POLICY_DN);
        assert_eq!(policy_dn(Some("Team\\SSH")), "\\VED\\Policy\\Team\\SSH");
        assert_eq!(
            policy_dn(Some("\\VED\\Policy\\Team")),
            "\\VED\\Policy\\Team"
        );
        assert_eq!(
            policy_dn(Some("\\Ved\\Policy\\Team")),
            "\\Ved\\Policy\\Team"
        );
    }

    #[test]
    fn failed_statuses_are_recognised() {
        assert!(is_failed_status("Rejected"));
        assert!(is_failed_status("Issuance failed"));
        assert!(!is_failed_status("Pending Issue"));
        assert!(!is_failed_status("Issued"));
    }
}
