pub mod extensions;
pub mod params;

use std::fmt;

use const_oid::ObjectIdentifier;
use const_oid::db::rfc8410;
use der::{Decode, DecodePem, Encode, EncodePem};
use x509_cert::certificate::CertificateInner;

use crate::digest::DigestAlgorithm;
use crate::error::{Result, SelfCaError, Stage};
use crate::key::KeyPair;

const MD5_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");
const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const SHA224_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.14");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");
const ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
const ECDSA_WITH_SHA224: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// PKCS#1 v1.5 RSA with the given digest.
    Rsa(DigestAlgorithm),
    /// ECDSA with the given digest.
    Ecdsa(DigestAlgorithm),
    /// PureEdDSA over edwards25519.
    Ed25519,
}

impl SignatureAlgorithm {
    /// Selects the signature algorithm for a key and requested digest.
    ///
    /// Fails when the pairing has no registered OID, e.g. MD5 with ECDSA.
    pub fn for_key(key: &KeyPair, digest: DigestAlgorithm) -> Result<Self> {
        let algorithm = match key {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Rsa(digest),
            KeyPair::EcdsaP256 { .. } | KeyPair::EcdsaP384 { .. } => {
                SignatureAlgorithm::Ecdsa(digest)
            }
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        };
        algorithm.oid().map(|_| algorithm).ok_or_else(|| {
            SelfCaError::encoding(
                Stage::SignatureAlgorithm,
                format!("{digest} cannot be used with a {} key", key.algorithm_name()),
            )
        })
    }

    pub fn oid(&self) -> Option<ObjectIdentifier> {
        match self {
            SignatureAlgorithm::Rsa(digest) => match digest {
                DigestAlgorithm::Md5 => Some(MD5_WITH_RSA),
                DigestAlgorithm::Sha1 => Some(SHA1_WITH_RSA),
                DigestAlgorithm::Sha224 => Some(SHA224_WITH_RSA),
                DigestAlgorithm::Sha256 => Some(SHA256_WITH_RSA),
                DigestAlgorithm::Sha384 => Some(SHA384_WITH_RSA),
                DigestAlgorithm::Sha512 => Some(SHA512_WITH_RSA),
                DigestAlgorithm::Md2 | DigestAlgorithm::Md4 => None,
            },
            SignatureAlgorithm::Ecdsa(digest) => match digest {
                DigestAlgorithm::Sha1 => Some(ECDSA_WITH_SHA1),
                DigestAlgorithm::Sha224 => Some(ECDSA_WITH_SHA224),
                DigestAlgorithm::Sha256 => Some(ECDSA_WITH_SHA256),
                DigestAlgorithm::Sha384 => Some(ECDSA_WITH_SHA384),
                DigestAlgorithm::Sha512 => Some(ECDSA_WITH_SHA512),
                _ => None,
            },
            SignatureAlgorithm::Ed25519 => Some(rfc8410::ID_ED_25519),
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        let rsa = [
            (MD5_WITH_RSA, DigestAlgorithm::Md5),
            (SHA1_WITH_RSA, DigestAlgorithm::Sha1),
            (SHA224_WITH_RSA, DigestAlgorithm::Sha224),
            (SHA256_WITH_RSA, DigestAlgorithm::Sha256),
            (SHA384_WITH_RSA, DigestAlgorithm::Sha384),
            (SHA512_WITH_RSA, DigestAlgorithm::Sha512),
        ];
        let ecdsa = [
            (ECDSA_WITH_SHA1, DigestAlgorithm::Sha1),
            (ECDSA_WITH_SHA224, DigestAlgorithm::Sha224),
            (ECDSA_WITH_SHA256, DigestAlgorithm::Sha256),
            (ECDSA_WITH_SHA384, DigestAlgorithm::Sha384),
            (ECDSA_WITH_SHA512, DigestAlgorithm::Sha512),
        ];
        if *oid == rfc8410::ID_ED_25519 {
            return Some(SignatureAlgorithm::Ed25519);
        }
        rsa.iter()
            .find(|(known, _)| known == oid)
            .map(|(_, digest)| SignatureAlgorithm::Rsa(*digest))
            .or_else(|| {
                ecdsa
                    .iter()
                    .find(|(known, _)| known == oid)
                    .map(|(_, digest)| SignatureAlgorithm::Ecdsa(*digest))
            })
    }

    pub fn digest(&self) -> Option<DigestAlgorithm> {
        match self {
            SignatureAlgorithm::Rsa(digest) | SignatureAlgorithm::Ecdsa(digest) => Some(*digest),
            SignatureAlgorithm::Ed25519 => None,
        }
    }

    /// Human readable description, e.g. `RSA with SHA-256`.
    pub fn description(&self) -> String {
        match self {
            SignatureAlgorithm::Rsa(digest) => {
                let name = match digest {
                    DigestAlgorithm::Sha224 => "SHA-224",
                    DigestAlgorithm::Sha256 => "SHA-256",
                    DigestAlgorithm::Sha384 => "SHA-384",
                    DigestAlgorithm::Sha512 => "SHA-512",
                    other => other.name(),
                };
                format!("RSA with {name}")
            }
            SignatureAlgorithm::Ecdsa(digest) => format!("ECDSA with {}", digest.name()),
            SignatureAlgorithm::Ed25519 => "Ed25519".to_string(),
        }
    }
}

/// Describes a signature algorithm OID, falling back to the dotted form.
pub fn describe_signature_oid(oid: &ObjectIdentifier) -> String {
    match SignatureAlgorithm::from_oid(oid) {
        Some(algorithm) => algorithm.description(),
        None if *oid == RSASSA_PSS => "RSASSA-PSS".to_string(),
        None => oid.to_string(),
    }
}

impl TryFrom<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    type Error = SelfCaError;

    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA algorithms carry explicit NULL parameters, ECDSA and EdDSA none.
    fn try_from(value: SignatureAlgorithm) -> Result<Self> {
        let oid = value.oid().ok_or_else(|| {
            SelfCaError::encoding(Stage::SignatureAlgorithm, "no OID for digest")
        })?;
        let parameters = match value {
            SignatureAlgorithm::Rsa(_) => Some(der::asn1::Any::null()),
            _ => None,
        };
        Ok(x509_cert::spki::AlgorithmIdentifierOwned { oid, parameters })
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Decodes a certificate from PEM text or raw DER.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let inner = if crate::pem_utils::looks_like_pem(bytes) {
            CertificateInner::from_pem(bytes)?
        } else {
            CertificateInner::from_der(bytes)?
        };
        Ok(Self { inner })
    }

    /// Encodes the certificate into DER format.
    ///
    /// Failures surface as [`SelfCaError::ParseError`], since the
    /// certificate was decoded before it is encoded again.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.to_der()?)
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| SelfCaError::encoding(Stage::PemEncoding, e))
    }
}

/// A signed certificate in PEM form, ready to be persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedCertificate(String);

impl SignedCertificate {
    pub fn from_certificate(cert: &Certificate) -> Result<Self> {
        cert.to_pem().map(SignedCertificate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

}

impl fmt::Display for SignedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SignedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SignedCertificate")
            .field(&format_args!("{} bytes of PEM", self.0.len()))
            .finish()
    }
}
