use crate::error::Error;
use base64::engine::general_purpose::STANDARD as BASE64_STD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

const MAX_KEY_ID_LEN: usize = 256;

/// Request parameters for SSH certificate issuance.
/// Use `new()`/`builder()` for forward-compatible construction.
///
/// When `public_key_data` is set the authority signs the caller's key and
/// never sees a private key. When it is unset the authority generates the
/// key pair and returns the private key on retrieval.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct SshCertRequest {
    cadn: String,
    key_id: String,
    pub policy_dn: Option<String>,
    /// Authority-side object name; the key id is used when unset.
    pub object_name: Option<String>,
    pub validity_period: Option<String>,
    pub principals: Vec<String>,
    pub source_addresses: Vec<String>,
    pub destination_addresses: Vec<String>,
    pub extensions: BTreeMap<String, String>,
    pub force_command: Option<String>,
    pub include_cert_details: bool,
    /// Overrides the connection's polling deadline for this request.
    pub timeout: Option<Duration>,
    public_key_data: Option<String>,
    private_key_passphrase: Option<String>,
    pickup_id: Option<String>,
    guid: Option<String>,
}

impl SshCertRequest {
    pub fn new(cadn: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            cadn: cadn.into(),
            key_id: key_id.into(),
            policy_dn: None,
            object_name: None,
            validity_period: None,
            principals: Vec::new(),
            source_addresses: Vec::new(),
            destination_addresses: Vec::new(),
            extensions: BTreeMap::new(),
            force_command: None,
            include_cert_details: false,
            timeout: None,
            public_key_data: None,
            private_key_passphrase: None,
            pickup_id: None,
            guid: None,
        }
    }

    pub fn builder(cadn: impl Into<String>, key_id: impl Into<String>) -> SshCertRequestBuilder {
        SshCertRequestBuilder::new(cadn, key_id)
    }

    pub fn cadn(&self) -> &str {
        &self.cadn
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Switches the request to the client-generated-key workflow.
    pub fn set_public_key_data(&mut self, public_key: impl Into<String>) {
        self.public_key_data = Some(public_key.into());
    }

    pub fn public_key_data(&self) -> Option<&str> {
        self.public_key_data.as_deref()
    }

    /// True when the authority is expected to generate the key pair.
    pub fn is_service_generated(&self) -> bool {
        self.public_key_data.is_none()
    }

    /// Passphrase the authority uses to encrypt a service-generated private key.
    pub fn set_private_key_passphrase(&mut self, passphrase: impl Into<String>) {
        self.private_key_passphrase = Some(passphrase.into());
    }

    pub fn private_key_passphrase(&self) -> Option<&str> {
        self.private_key_passphrase.as_deref()
    }

    pub fn object_name_or_key_id(&self) -> &str {
        self.object_name.as_deref().unwrap_or(&self.key_id)
    }

    /// Authority-side identifier recorded when the request was accepted.
    pub fn pickup_id(&self) -> Option<&str> {
        self.pickup_id.as_deref()
    }

    pub fn guid(&self) -> Option<&str> {
        self.guid.as_deref()
    }

    pub(crate) fn record_submission(&mut self, pickup_id: Option<String>, guid: Option<String>) {
        if pickup_id.is_some() {
            self.pickup_id = pickup_id;
        }
        if guid.is_some() {
            self.guid = guid;
        }
    }

    /// Checks everything that can be checked without contacting the authority.
    pub fn validate(&self) -> Result<(), Error> {
        if self.cadn.trim().is_empty() {
            return Err(Error::Validation("cadn must not be empty".to_string()));
        }
        validate_key_id(&self.key_id)?;
        if let Some(ref period) = self.validity_period {
            parse_validity_period(period)?;
        }
        validate_addresses("source address", &self.source_addresses)?;
        validate_addresses("destination address", &self.destination_addresses)?;
        if self.principals.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::Validation("principals must not be empty".to_string()));
        }
        if let Some(ref public_key) = self.public_key_data {
            ssh_key::PublicKey::from_openssh(public_key.trim()).map_err(|e| {
                Error::Validation(format!("public key data is not an OpenSSH public key: {e}"))
            })?;
            if self.private_key_passphrase.is_some() {
                return Err(Error::Validation(
                    "private key passphrase only applies to service-generated keys".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SshCertRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshCertRequest")
            .field("cadn", &self.cadn)
            .field("key_id", &self.key_id)
            .field("policy_dn", &self.policy_dn)
            .field("object_name", &self.object_name)
            .field("validity_period", &self.validity_period)
            .field("principals", &self.principals)
            .field("source_addresses", &self.source_addresses)
            .field("destination_addresses", &self.destination_addresses)
            .field("extensions", &self.extensions)
            .field("force_command", &self.force_command)
            .field("public_key_data", &self.public_key_data)
            .field(
                "private_key_passphrase",
                &self.private_key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("pickup_id", &self.pickup_id)
            .field("guid", &self.guid)
            .finish()
    }
}

/// Builder for constructing [`SshCertRequest`] values.
#[derive(Debug, Clone)]
pub struct SshCertRequestBuilder {
    request: SshCertRequest,
}

impl SshCertRequestBuilder {
    pub fn new(cadn: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            request: SshCertRequest::new(cadn, key_id),
        }
    }

    pub fn policy_dn(mut self, value: impl Into<String>) -> Self {
        self.request.policy_dn = Some(value.into());
        self
    }

    pub fn object_name(mut self, value: impl Into<String>) -> Self {
        self.request.object_name = Some(value.into());
        self
    }

    pub fn validity_period(mut self, value: impl Into<String>) -> Self {
        self.request.validity_period = Some(value.into());
        self
    }

    pub fn principals<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.principals = principals.into_iter().map(Into::into).collect();
        self
    }

    pub fn source_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.source_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn destination_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.destination_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn extension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.extensions.insert(name.into(), value.into());
        self
    }

    pub fn force_command(mut self, value: impl Into<String>) -> Self {
        self.request.force_command = Some(value.into());
        self
    }

    pub fn public_key_data(mut self, value: impl Into<String>) -> Self {
        self.request.set_public_key_data(value);
        self
    }

    pub fn private_key_passphrase(mut self, value: impl Into<String>) -> Self {
        self.request.set_private_key_passphrase(value);
        self
    }

    pub fn include_cert_details(mut self, value: bool) -> Self {
        self.request.include_cert_details = value;
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.request.timeout = Some(value);
        self
    }

    pub fn build(self) -> SshCertRequest {
        self.request
    }
}

/// Details the authority reports about an issued certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SshCertificateDetails {
    pub key_id: Option<String>,
    pub serial_number: Option<String>,
    pub certificate_type: Option<String>,
    pub principals: Vec<String>,
    pub source_addresses: Vec<String>,
    /// Unix seconds.
    pub valid_from: Option<i64>,
    /// Unix seconds.
    pub valid_to: Option<i64>,
    pub force_command: Option<String>,
    pub extensions: BTreeMap<String, String>,
    pub public_key_fingerprint_sha256: Option<String>,
    pub certificate_fingerprint_sha256: Option<String>,
    pub ca_fingerprint_sha256: Option<String>,
}

/// The issued certificate and, for service-generated keys, the key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct SshRetrieveResponse {
    pub cert_data: String,
    pub public_key_data: String,
    /// Present only when the authority generated the key pair.
    pub private_key_data: Option<String>,
    pub certificate_details: Option<SshCertificateDetails>,
    pub cadn: Option<String>,
    pub ca_guid: Option<String>,
}

impl fmt::Debug for SshRetrieveResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshRetrieveResponse")
            .field("cert_data", &self.cert_data)
            .field("public_key_data", &self.public_key_data)
            .field(
                "private_key_data",
                &self.private_key_data.as_ref().map(|_| "<redacted>"),
            )
            .field("certificate_details", &self.certificate_details)
            .field("cadn", &self.cadn)
            .field("ca_guid", &self.ca_guid)
            .finish()
    }
}

/// Raw material as a backend received it, before it is checked against the request.
#[derive(Clone, Default)]
pub(crate) struct IssuedMaterial {
    pub cert_data: Option<String>,
    pub public_key_data: Option<String>,
    pub private_key_data: Option<String>,
    pub certificate_details: Option<SshCertificateDetails>,
    pub cadn: Option<String>,
    pub ca_guid: Option<String>,
}

impl IssuedMaterial {
    /// Builds the caller-facing response, enforcing the key-material rules:
    /// a client-supplied key is echoed exactly and never paired with a
    /// private key, a service-generated key always comes with one.
    pub(crate) fn into_response(self, request: &SshCertRequest) -> Result<SshRetrieveResponse, Error> {
        let key_id = request.key_id();
        let cert_data = non_empty(self.cert_data).ok_or_else(|| Error::IncompleteIssuance {
            key_id: key_id.to_string(),
            reason: "authority returned no certificate data".to_string(),
        })?;
        let returned_public = non_empty(self.public_key_data);
        let returned_private = non_empty(self.private_key_data);

        let (public_key_data, private_key_data) = match request.public_key_data() {
            Some(submitted) => {
                if let Some(ref returned) = returned_public {
                    if !public_keys_match(submitted, returned) {
                        return Err(Error::PublicKeyMismatch(key_id.to_string()));
                    }
                }
                if returned_private.is_some() {
                    log::warn!(
                        "discarding private key returned for client-generated key id {key_id}"
                    );
                }
                (submitted.to_string(), None)
            }
            None => {
                let private = returned_private.ok_or_else(|| Error::IncompleteIssuance {
                    key_id: key_id.to_string(),
                    reason: "authority returned no private key for a service-generated key"
                        .to_string(),
                })?;
                let public = returned_public.ok_or_else(|| Error::IncompleteIssuance {
                    key_id: key_id.to_string(),
                    reason: "authority returned no public key for a service-generated key"
                        .to_string(),
                })?;
                (public, Some(private))
            }
        };

        Ok(SshRetrieveResponse {
            cert_data,
            public_key_data,
            private_key_data,
            certificate_details: self.certificate_details,
            cadn: self.cadn,
            ca_guid: self.ca_guid,
        })
    }
}

/// Identifies the CA template whose configuration is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshConfigRequest {
    pub cadn: Option<String>,
    pub guid: Option<String>,
}

impl SshConfigRequest {
    pub fn new(cadn: impl Into<String>) -> Self {
        Self {
            cadn: Some(cadn.into()),
            guid: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        let has_cadn = self.cadn.as_deref().is_some_and(|v| !v.trim().is_empty());
        let has_guid = self.guid.as_deref().is_some_and(|v| !v.trim().is_empty());
        if has_cadn || has_guid {
            Ok(())
        } else {
            Err(Error::Validation(
                "either cadn or guid is required to look up a CA template".to_string(),
            ))
        }
    }
}

/// CA public key and default principals of a CA template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshConfigResponse {
    pub ca_public_key: String,
    pub principals: Vec<String>,
}

/// Parses validity strings such as `4h`, `90m` or `1d12h`.
pub fn parse_validity_period(value: &str) -> Result<Duration, Error> {
    let invalid = |reason: &str| {
        Error::Validation(format!("invalid validity period '{value}': {reason}"))
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }
    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c.to_ascii_lowercase() {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            'w' => 7 * 24 * 60 * 60,
            _ => return Err(invalid("unknown unit")),
        };
        if digits.is_empty() {
            return Err(invalid("unit without a number"));
        }
        let amount: u64 = digits.parse().map_err(|_| invalid("number too large"))?;
        digits.clear();
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| invalid("overflow"))?;
    }
    if !digits.is_empty() {
        return Err(invalid("missing unit"));
    }
    if total == 0 {
        return Err(invalid("must be positive"));
    }
    Ok(Duration::from_secs(total))
}

fn validate_key_id(key_id: &str) -> Result<(), Error> {
    if key_id.trim().is_empty() {
        return Err(Error::Validation("key id must not be empty".to_string()));
    }
    if key_id.len() > MAX_KEY_ID_LEN {
        return Err(Error::Validation(format!(
            "key id exceeds {MAX_KEY_ID_LEN} bytes"
        )));
    }
    if key_id.chars().any(char::is_control) {
        return Err(Error::Validation(
            "key id must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_addresses(kind: &str, addresses: &[String]) -> Result<(), Error> {
    for address in addresses {
        if address.trim().is_empty() {
            return Err(Error::Validation(format!("{kind} must not be empty")));
        }
        if address.chars().any(char::is_whitespace) {
            return Err(Error::Validation(format!(
                "{kind} '{address}' must not contain whitespace"
            )));
        }
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Compares two OpenSSH public keys by algorithm and key blob, ignoring comments.
pub(crate) fn public_keys_match(left: &str, right: &str) -> bool {
    match (key_blob(left), key_blob(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left.trim() == right.trim(),
    }
}

fn key_blob(public_key: &str) -> Option<(String, Vec<u8>)> {
    let mut parts = public_key.split_whitespace();
    let algorithm = parts.next()?;
    let blob = BASE64_STD.decode(parts.next()?).ok()?;
    Some((algorithm.to_string(), blob))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED25519_PUB: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIJdD7y3aLq454yWBdwLWbieU1ebz9/cu7/QEXn9OIeZJ test@host";

    #[test]
    fn validity_period_accepts_compound_values() {
        assert_eq!(parse_validity_period("4h").unwrap(), Duration::from_secs(4 * 3600));
        assert_eq!(
            parse_validity_period("1d12h").unwrap(),
            Duration::from_secs(36 * 3600)
        );
        assert_eq!(parse_validity_period("90M").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn validity_period_rejects_malformed_values() {
        for value in ["", "4", "h", "4x", "0h", "99999999999999999999h"] {
            let err = parse_validity_period(value).expect_err(value);
            assert!(matches!(err, Error::Validation(_)), "{value}: {err}");
        }
    }

    #[test]
    fn validate_rejects_empty_cadn_and_key_id() {
        let err = SshCertRequest::new(" ", "k1").validate().unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("cadn")));
        let err = SshCertRequest::new("CA1", "").validate().unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("key id")));
    }

    #[test]
    fn validate_rejects_garbage_public_key() {
        let request = SshCertRequest::builder("CA1", "k1")
            .public_key_data("not a key")
            .build();
        assert!(matches!(request.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn validate_rejects_passphrase_with_client_key() {
        let request = SshCertRequest::builder("CA1", "k1")
            .public_key_data(ED25519_PUB)
            .private_key_passphrase("secret")
            .build();
        let err = request.validate().unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("passphrase")));
    }

    #[test]
    fn validate_rejects_whitespace_in_source_address() {
        let request = SshCertRequest::builder("CA1", "k1")
            .source_addresses(["10.0.0.0/8", "bad host"])
            .build();
        assert!(matches!(request.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn validate_accepts_complete_request() {
        let request = SshCertRequest::builder("CA1", "k1")
            .validity_period("4h")
            .source_addresses(["test.com"])
            .principals(["alice"])
            .public_key_data(ED25519_PUB)
            .build();
        request.validate().expect("valid");
        assert!(!request.is_service_generated());
        assert_eq!(request.object_name_or_key_id(), "k1");
    }

    #[test]
    fn debug_redacts_passphrase() {
        let request = SshCertRequest::builder("CA1", "k1")
            .private_key_passphrase("hunter2")
            .build();
        let debug = format!("{request:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn client_key_is_echoed_and_private_key_dropped() {
        let request = SshCertRequest::builder("CA1", "k1")
            .public_key_data(ED25519_PUB)
            .build();
        let material = IssuedMaterial {
            cert_data: Some("cert".to_string()),
            public_key_data: Some(
                "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIJdD7y3aLq454yWBdwLWbieU1ebz9/cu7/QEXn9OIeZJ"
                    .to_string(),
            ),
            private_key_data: Some("unexpected".to_string()),
            ..IssuedMaterial::default()
        };
        let response = material.into_response(&request).expect("response");
        assert_eq!(response.public_key_data, ED25519_PUB);
        assert!(response.private_key_data.is_none());
    }

    #[test]
    fn mismatched_public_key_is_rejected() {
        let request = SshCertRequest::builder("CA1", "k1")
            .public_key_data(ED25519_PUB)
            .build();
        let material = IssuedMaterial {
            cert_data: Some("cert".to_string()),
            public_key_data: Some(
                "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
                    .to_string(),
            ),
            ..IssuedMaterial::default()
        };
        let err = material.into_response(&request).unwrap_err();
        assert!(matches!(err, Error::PublicKeyMismatch(id) if id == "k1"));
    }

    #[test]
    fn service_generated_requires_private_key() {
        let request = SshCertRequest::new("CA1", "k1");
        let material = IssuedMaterial {
            cert_data: Some("cert".to_string()),
            public_key_data: Some(ED25519_PUB.to_string()),
            private_key_data: Some(String::new()),
            ..IssuedMaterial::default()
        };
        let err = material.into_response(&request).unwrap_err();
        assert!(matches!(err, Error::IncompleteIssuance { .. }));
    }

    #[test]
    fn empty_certificate_is_incomplete() {
        let request = SshCertRequest::new("CA1", "k1");
        let err = IssuedMaterial::default().into_response(&request).unwrap_err();
        assert!(matches!(err, Error::IncompleteIssuance { key_id, .. } if key_id == "k1"));
    }

    #[test]
    fn config_request_requires_identifier() {
        assert!(SshConfigRequest::default().validate().is_err());
        assert!(SshConfigRequest::new("CA1").validate().is_ok());
    }
}
