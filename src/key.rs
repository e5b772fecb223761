use std::fmt;

use const_oid::AssociatedOid;
use const_oid::db::{rfc5912, rfc8410};
use ecdsa::signature::hazmat::RandomizedPrehashSigner;
use ed25519_dalek::Signer as _;
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::DecodePrivateKey;
use rand_core::CryptoRngCore;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Digest;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::digest::DigestAlgorithm;
use crate::error::{Result, SelfCaError, Stage};
use crate::pem_utils;

/// Supported key types for certificate signing.
///
/// Keys are never generated here; they are loaded from an existing PEM or DER
/// file. All variants zeroize their secret material on drop.
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

fn key_error(err: impl fmt::Display) -> SelfCaError {
    SelfCaError::KeyLoadError(err.to_string())
}

impl KeyPair {
    /// Loads a private key from PEM or DER bytes.
    ///
    /// PEM blocks labelled `PRIVATE KEY` (PKCS#8), `RSA PRIVATE KEY` (PKCS#1)
    /// and `EC PRIVATE KEY` (SEC1) are accepted. DER input is tried in the same
    /// order.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if pem_utils::looks_like_pem(bytes) {
            Self::import_from_pem(bytes)
        } else {
            Self::import_from_der(bytes)
        }
    }

    pub fn import_from_pem(pem_bytes: &[u8]) -> Result<Self> {
        let (label, der) = pem_utils::pem_to_der(pem_bytes).map_err(key_error)?;
        match label.as_str() {
            "PRIVATE KEY" => Self::import_from_pkcs8_der(&der),
            "RSA PRIVATE KEY" => Self::import_from_pkcs1_der(&der),
            "EC PRIVATE KEY" => Self::import_from_sec1_der(&der),
            "ENCRYPTED PRIVATE KEY" => Err(SelfCaError::KeyLoadError(
                "encrypted private keys are not supported".to_string(),
            )),
            other => Err(SelfCaError::KeyLoadError(format!(
                "unexpected PEM label: {other}"
            ))),
        }
    }

    pub fn import_from_der(der: &[u8]) -> Result<Self> {
        Self::import_from_pkcs8_der(der)
            .or_else(|_| Self::import_from_pkcs1_der(der))
            .or_else(|_| Self::import_from_sec1_der(der))
            .map_err(|_| {
                SelfCaError::KeyLoadError(
                    "not a PKCS#8, PKCS#1 or SEC1 private key".to_string(),
                )
            })
    }

    pub fn import_from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(der).map_err(key_error)?;
        match info.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => {
                let private = RsaPrivateKey::from_pkcs8_der(der).map_err(key_error)?;
                Self::from_rsa(private)
            }
            rfc5912::ID_EC_PUBLIC_KEY => {
                let curve = info.algorithm.parameters_oid().map_err(key_error)?;
                match curve {
                    rfc5912::SECP_256_R_1 => {
                        let secret = p256::SecretKey::from_pkcs8_der(der).map_err(key_error)?;
                        Ok(Self::from_p256(P256SigningKey::from(secret)))
                    }
                    rfc5912::SECP_384_R_1 => {
                        let secret = p384::SecretKey::from_pkcs8_der(der).map_err(key_error)?;
                        Ok(Self::from_p384(P384SigningKey::from(secret)))
                    }
                    other => Err(SelfCaError::KeyLoadError(format!(
                        "unsupported elliptic curve: {other}"
                    ))),
                }
            }
            rfc8410::ID_ED_25519 => {
                let signing_key = Ed25519SigningKey::from_pkcs8_der(der).map_err(key_error)?;
                Ok(KeyPair::Ed25519 { signing_key })
            }
            other => Err(SelfCaError::KeyLoadError(format!(
                "unsupported key algorithm: {other}"
            ))),
        }
    }

    pub fn import_from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_der(der).map_err(key_error)?;
        Self::from_rsa(private)
    }

    pub fn import_from_sec1_der(der: &[u8]) -> Result<Self> {
        if let Ok(secret) = p256::SecretKey::from_sec1_der(der) {
            return Ok(Self::from_p256(P256SigningKey::from(secret)));
        }
        let secret = p384::SecretKey::from_sec1_der(der).map_err(key_error)?;
        Ok(Self::from_p384(P384SigningKey::from(secret)))
    }

    fn from_rsa(private: RsaPrivateKey) -> Result<Self> {
        private.validate().map_err(key_error)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    fn from_p256(signing_key: P256SigningKey) -> Self {
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    fn from_p384(signing_key: P384SigningKey) -> Self {
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Short algorithm name, as reported in certificate descriptions.
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            KeyPair::Rsa { .. } => "RSA",
            KeyPair::EcdsaP256 { .. } | KeyPair::EcdsaP384 { .. } => "EC",
            KeyPair::Ed25519 { .. } => "ED25519",
        }
    }

    pub fn bits(&self) -> usize {
        match self {
            KeyPair::Rsa { public, .. } => public.n().bits(),
            KeyPair::EcdsaP256 { .. } => 256,
            KeyPair::EcdsaP384 { .. } => 384,
            KeyPair::Ed25519 { .. } => 256,
        }
    }

    /// The public half as a `SubjectPublicKeyInfo`.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            KeyPair::Rsa { public, .. } => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)
            }
            KeyPair::EcdsaP384 { verifying_key, .. } => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)
            }
            KeyPair::Ed25519 { signing_key } => {
                SubjectPublicKeyInfoOwned::from_key(signing_key.verifying_key())
            }
        };
        spki.map_err(|e| SelfCaError::encoding(Stage::SubjectKey, e))
    }

    /// Signs `data` with the given digest.
    ///
    /// RSA uses PKCS#1 v1.5 with blinding drawn from `rng`; ECDSA signs the
    /// prehash with added entropy from `rng` and returns a DER signature.
    /// Ed25519 signs `data` directly and ignores `digest`.
    pub fn sign_data(
        &self,
        data: &[u8],
        digest: DigestAlgorithm,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa { private, .. } => match digest {
                DigestAlgorithm::Md5 => rsa_sign::<md5::Md5>(private, data, rng),
                DigestAlgorithm::Sha1 => rsa_sign::<sha1::Sha1>(private, data, rng),
                DigestAlgorithm::Sha224 => rsa_sign::<sha2::Sha224>(private, data, rng),
                DigestAlgorithm::Sha256 => rsa_sign::<sha2::Sha256>(private, data, rng),
                DigestAlgorithm::Sha384 => rsa_sign::<sha2::Sha384>(private, data, rng),
                DigestAlgorithm::Sha512 => rsa_sign::<sha2::Sha512>(private, data, rng),
                DigestAlgorithm::Md2 | DigestAlgorithm::Md4 => Err(SelfCaError::encoding(
                    Stage::Sign,
                    format!("{digest} is not available"),
                )),
            },
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let prehash = digest.digest(data)?;
                let signature: p256::ecdsa::Signature = signing_key
                    .sign_prehash_with_rng(rng, &prehash)
                    .map_err(|e| SelfCaError::encoding(Stage::Sign, e))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                let prehash = digest.digest(data)?;
                let signature: p384::ecdsa::Signature = signing_key
                    .sign_prehash_with_rng(rng, &prehash)
                    .map_err(|e| SelfCaError::encoding(Stage::Sign, e))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::Ed25519 { signing_key } => Ok(signing_key.sign(data).to_bytes().to_vec()),
        }
    }
}

fn rsa_sign<D>(
    private: &RsaPrivateKey,
    data: &[u8],
    rng: &mut impl CryptoRngCore,
) -> Result<Vec<u8>>
where
    D: Digest + AssociatedOid,
{
    let signing_key = rsa::pkcs1v15::SigningKey::<D>::new(private.clone());
    let signature = signing_key
        .try_sign_with_rng(rng, data)
        .map_err(|e| SelfCaError::encoding(Stage::Sign, e))?;
    Ok(signature.to_vec())
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm_name())
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::{EncodePrivateKey, LineEnding};
    use rand_core::OsRng;

    #[test]
    fn test_load_p256_pkcs8_and_sec1() {
        let secret = p256::SecretKey::random(&mut OsRng);
        let pkcs8 = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        let sec1 = secret.to_sec1_pem(LineEnding::LF).unwrap();

        let from_pkcs8 = KeyPair::load(pkcs8.as_bytes()).unwrap();
        let from_sec1 = KeyPair::load(sec1.as_bytes()).unwrap();
        assert_eq!(from_pkcs8.algorithm_name(), "EC");
        assert_eq!(from_sec1.bits(), 256);
        assert_eq!(
            from_pkcs8.as_spki().unwrap(),
            from_sec1.as_spki().unwrap()
        );
    }

    #[test]
    fn test_load_p384_der() {
        let secret = p384::SecretKey::random(&mut OsRng);
        let der = secret.to_pkcs8_der().unwrap();
        let key = KeyPair::load(der.as_bytes()).unwrap();
        assert_eq!(key.bits(), 384);
    }

    #[test]
    fn test_load_ed25519() {
        let signing_key = Ed25519SigningKey::generate(&mut OsRng);
        let pem = signing_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let key = KeyPair::load(pem.as_bytes()).unwrap();
        assert_eq!(key.algorithm_name(), "ED25519");
    }

    #[test]
    fn test_load_garbage_is_key_load_error() {
        assert!(matches!(
            KeyPair::load(b"not a key at all"),
            Err(SelfCaError::KeyLoadError(_))
        ));
        let pem = "-----BEGIN CERTIFICATE-----\nAQID\n-----END CERTIFICATE-----\n";
        assert!(matches!(
            KeyPair::load(pem.as_bytes()),
            Err(SelfCaError::KeyLoadError(_))
        ));
    }

    #[test]
    fn test_p384_rejects_short_prehash() {
        let key = KeyPair::from_p384(P384SigningKey::random(&mut OsRng));
        let result = key.sign_data(b"tbs", DigestAlgorithm::Sha1, &mut OsRng);
        assert!(matches!(
            result,
            Err(SelfCaError::EncodingError {
                stage: Stage::Sign,
                ..
            })
        ));
    }
}
