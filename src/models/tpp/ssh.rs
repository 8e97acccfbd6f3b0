use crate::models::SshCertificateDetails;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SshCertificateRequest {
    #[serde(rename = "CADN")]
    pub cadn: String,
    #[serde(rename = "PolicyDN", skip_serializing_if = "Option::is_none")]
    pub policy_dn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destination_addresses: Vec<String>,
    pub key_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub principals: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_data: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct ResponseStatus {
    pub success: bool,
    pub error_code: Option<i32>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct ProcessingDetails {
    pub status: Option<String>,
    pub status_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SshCertificateResponse {
    #[serde(rename = "DN", default)]
    pub dn: Option<String>,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub processing_details: Option<ProcessingDetails>,
    #[serde(default)]
    pub response: Option<ResponseStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SshRetrieveRequest {
    #[serde(rename = "DN", skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    pub include_private_key_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_passphrase: Option<String>,
    pub include_certificate_details: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CertificateDetails {
    #[serde(rename = "KeyID")]
    pub key_id: Option<String>,
    #[serde(rename = "SerialNumber")]
    pub serial_number: Option<String>,
    #[serde(rename = "CertificateType")]
    pub certificate_type: Option<String>,
    #[serde(rename = "Principals")]
    pub principals: Vec<String>,
    #[serde(rename = "SourceAddresses")]
    pub source_addresses: Vec<String>,
    #[serde(rename = "ValidFrom")]
    pub valid_from: Option<i64>,
    #[serde(rename = "ValidTo")]
    pub valid_to: Option<i64>,
    #[serde(rename = "ForceCommand")]
    pub force_command: Option<String>,
    #[serde(rename = "Extensions")]
    pub extensions: BTreeMap<String, String>,
    #[serde(rename = "PublicKeyFingerprintSHA256")]
    pub public_key_fingerprint_sha256: Option<String>,
    #[serde(rename = "CertificateFingerprintSHA256")]
    pub certificate_fingerprint_sha256: Option<String>,
    #[serde(rename = "CAFingerprintSHA256")]
    pub ca_fingerprint_sha256: Option<String>,
}

impl From<CertificateDetails> for SshCertificateDetails {
    fn from(details: CertificateDetails) -> Self {
        Self {
            key_id: details.key_id,
            serial_number: details.serial_number,
            certificate_type: details.certificate_type,
            principals: details.principals,
            source_addresses: details.source_addresses,
            valid_from: details.valid_from,
            valid_to: details.valid_to,
            force_command: details.force_command,
            extensions: details.extensions,
            public_key_fingerprint_sha256: details.public_key_fingerprint_sha256,
            certificate_fingerprint_sha256: details.certificate_fingerprint_sha256,
            ca_fingerprint_sha256: details.ca_fingerprint_sha256,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct SshRetrieveResponse {
    pub certificate_data: Option<String>,
    pub private_key_data: Option<String>,
    pub public_key_data: Option<String>,
    pub certificate_details: Option<CertificateDetails>,
    pub processing_details: Option<ProcessingDetails>,
    pub response: Option<ResponseStatus>,
    #[serde(rename = "CADN")]
    pub cadn: Option<String>,
    #[serde(rename = "CAGuid")]
    pub ca_guid: Option<String>,
}

/// Addresses an existing object (certificate request or CA template) by DN or GUID.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ObjectRequest {
    #[serde(rename = "DN", skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct AccessControl {
    pub default_principals: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct SshTemplateResponse {
    pub access_control: Option<AccessControl>,
    pub response: Option<ResponseStatus>,
}
