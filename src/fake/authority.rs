use crate::error::{ApiError, Error};
use crate::keygen::{KeyAlgorithm, KeyPairGenerator};
use crate::models::{parse_validity_period, IssuedMaterial, SshCertRequest, SshCertificateDetails};
use rand::rngs::OsRng;
use ssh_key::certificate::{Builder, CertType};
use ssh_key::{Algorithm, HashAlg, PrivateKey, PublicKey};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DEFAULT_VALIDITY: Duration = Duration::from_secs(24 * 3600);
/// Allowance for clock skew between the authority and the host using the certificate.
const BACKDATE: Duration = Duration::from_secs(60);

/// Ephemeral signing CA of the in-memory authority.
pub(super) struct CertificateAuthority {
    key: PrivateKey,
}

impl CertificateAuthority {
    pub(super) fn generate() -> Result<Self, Error> {
        let mut key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
            .map_err(|e| Error::KeyGeneration(format!("fake ca key: {e}")))?;
        key.set_comment("vcert-rs fake ca");
        Ok(Self { key })
    }

    pub(super) fn public_key(&self) -> Result<String, Error> {
        self.key
            .public_key()
            .to_openssh()
            .map_err(|e| Error::KeyGeneration(e.to_string()))
    }

    /// Signs the request's key, generating one first for service-generated
    /// requests.
    pub(super) fn issue(&self, request: &SshCertRequest, serial: u64) -> Result<IssuedMaterial, Error> {
        let (public_key, private_key) = match request.public_key_data() {
            Some(public_key) => (public_key.to_string(), None),
            None => {
                let pair = KeyPairGenerator::new(KeyAlgorithm::Ed25519)
                    .comment(request.key_id())
                    .generate(request.private_key_passphrase())?;
                (pair.public_key, Some(pair.private_key))
            }
        };
        let subject = PublicKey::from_openssh(public_key.trim())
            .map_err(|e| Error::Validation(format!("public key data is not an OpenSSH public key: {e}")))?;

        let validity = match request.validity_period.as_deref() {
            Some(period) => parse_validity_period(period)?,
            None => DEFAULT_VALIDITY,
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Config(format!("system clock before unix epoch: {e}")))?;
        let valid_after = now.saturating_sub(BACKDATE).as_secs();
        let valid_before = (now + validity).as_secs();

        let certificate = self
            .sign(request, &subject, serial, valid_after, valid_before)
            .map_err(|e| {
                Error::Authority(ApiError {
                    status: 500,
                    code: None,
                    message: format!("fake ca failed to sign: {e}"),
                    description: None,
                })
            })?;
        let cert_data = certificate
            .to_openssh()
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;

        let details = request.include_cert_details.then(|| SshCertificateDetails {
            key_id: Some(request.key_id().to_string()),
            serial_number: Some(serial.to_string()),
            certificate_type: Some("user".to_string()),
            principals: request.principals.clone(),
            source_addresses: request.source_addresses.clone(),
            valid_from: i64::try_from(valid_after).ok(),
            valid_to: i64::try_from(valid_before).ok(),
            force_command: request.force_command.clone(),
            extensions: request.extensions.clone(),
            public_key_fingerprint_sha256: Some(subject.fingerprint(HashAlg::Sha256).to_string()),
            certificate_fingerprint_sha256: None,
            ca_fingerprint_sha256: Some(
                self.key.public_key().fingerprint(HashAlg::Sha256).to_string(),
            ),
        });

        Ok(IssuedMaterial {
            cert_data: Some(cert_data),
            public_key_data: Some(public_key),
            private_key_data: private_key,
            certificate_details: details,
            cadn: Some(request.cadn().to_string()),
            ca_guid: None,
        })
    }

    fn sign(
        &self,
        request: &SshCertRequest,
        subject: &PublicKey,
        serial: u64,
        valid_after: u64,
        valid_before: u64,
    ) -> Result<ssh_key::Certificate, ssh_key::Error> {
        let mut builder = Builder::new_with_random_nonce(
            &mut OsRng,
            subject.key_data().clone(),
            valid_after,
            valid_before,
        )?;
        builder
            .serial(serial)?
            .key_id(request.key_id())?
            .cert_type(CertType::User)?;
        if request.principals.is_empty() {
            builder.all_principals_valid()?;
        }
        for principal in &request.principals {
            builder.valid_principal(principal)?;
        }
        if !request.source_addresses.is_empty() {
            builder.critical_option("source-address", request.source_addresses.join(","))?;
        }
        if let Some(ref command) = request.force_command {
            builder.critical_option("force-command", command)?;
        }
        for (name, value) in &request.extensions {
            builder.extension(name, value)?;
        }
        builder.sign(&self.key)
    }
}
