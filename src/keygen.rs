use crate::error::Error;
use rand::rngs::OsRng;
use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::{Algorithm, HashAlg, LineEnding, PrivateKey};
use std::fmt;

pub const MIN_RSA_BITS: usize = 2048;
pub const MAX_RSA_BITS: usize = 8192;

/// Key algorithms the generator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa { bits: usize },
    Ed25519,
}

/// OpenSSH key pair ready for enrollment.
///
/// `public_key` can be passed directly as a request's public key data.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
    pub passphrase_protected: bool,
    /// SHA-256 fingerprint of the public key, `SHA256:...`.
    pub fingerprint: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("passphrase_protected", &self.passphrase_protected)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct KeyPairGenerator {
    algorithm: KeyAlgorithm,
    comment: String,
}

impl KeyPairGenerator {
    pub fn new(algorithm: KeyAlgorithm) -> Self {
        Self {
            algorithm,
            comment: String::new(),
        }
    }

    /// Comment stored in both halves of the key pair.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Generates a fresh key pair, encrypting the private half when a
    /// non-empty passphrase is given.
    pub fn generate(&self, passphrase: Option<&str>) -> Result<KeyPair, Error> {
        let mut key = match self.algorithm {
            KeyAlgorithm::Rsa { bits } => {
                validate_rsa_bits(bits)?;
                let private = rsa::RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| {
                    Error::KeyGeneration(format!("rsa key generation failed: {e}"))
                })?;
                let keypair = RsaKeypair::try_from(private).map_err(|e| {
                    Error::KeyGeneration(format!("rsa key encoding failed: {e}"))
                })?;
                PrivateKey::new(KeypairData::from(keypair), self.comment.as_str())
                    .map_err(key_error)?
            }
            KeyAlgorithm::Ed25519 => {
                let mut key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).map_err(key_error)?;
                key.set_comment(self.comment.as_str());
                key
            }
        };
        let fingerprint = key.public_key().fingerprint(HashAlg::Sha256).to_string();
        let public_key = key.public_key().to_openssh().map_err(key_error)?;

        let passphrase = passphrase.filter(|p| !p.is_empty());
        if let Some(passphrase) = passphrase {
            key = key.encrypt(&mut OsRng, passphrase).map_err(key_error)?;
        }
        let private_key = key.to_openssh(LineEnding::LF).map_err(key_error)?.to_string();

        log::debug!("generated {:?} key pair {fingerprint}", key.algorithm());
        Ok(KeyPair {
            public_key,
            private_key,
            passphrase_protected: passphrase.is_some(),
            fingerprint,
        })
    }
}

/// Generates an RSA key pair of `key_size` bits in OpenSSH format.
pub fn generate_ssh_keypair(key_size: usize, passphrase: Option<&str>) -> Result<KeyPair, Error> {
    KeyPairGenerator::new(KeyAlgorithm::Rsa { bits: key_size }).generate(passphrase)
}

fn validate_rsa_bits(bits: usize) -> Result<(), Error> {
    if !(MIN_RSA_BITS..=MAX_RSA_BITS).contains(&bits) || bits % 8 != 0 {
        return Err(Error::KeyGeneration(format!(
            "rsa key size must be a multiple of 8 between {MIN_RSA_BITS} and {MAX_RSA_BITS} bits, got {bits}"
        )));
    }
    Ok(())
}

fn key_error(err: ssh_key::Error) -> Error {
    Error::KeyGeneration(err.to_string())
}
