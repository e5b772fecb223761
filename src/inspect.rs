//! Reading an existing certificate back into request form.
//!
//! [`inspect`] extracts the fields a [`RequestFields`] record is made of, so
//! that a certificate can be edited and signed again with the same key.

use std::fmt;
use std::path::Path;

use const_oid::ObjectIdentifier;
use const_oid::db::{rfc5912, rfc8410};
use rsa::BigUint;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use serde::Serialize;
use x509_cert::Version;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::extensions::{BasicConstraints, KeyUsage, ToAndFromX509Extension};
use crate::cert::params::{DistinguishedName, KeyUsageFlags, PathLenConstraint, format_time};
use crate::cert::{Certificate, SignatureAlgorithm, describe_signature_oid};
use crate::digest::DigestAlgorithm;
use crate::error::{Result, SelfCaError};
use crate::request::RequestFields;
use crate::storage;
use crate::tbs_certificate::from_x509_time;

const SECP_256_K_1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");

/// Fields recovered from a certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    pub subject: DistinguishedName,
    pub key_usage: KeyUsageFlags,
    pub is_ca: bool,
    /// Absent unless the certificate is a CA.
    pub max_path_len: Option<PathLenConstraint>,
    /// e.g. `RSA with SHA-256 - KEY[ RSA: 2048 bits ] isCA`
    pub key_algorithm_description: String,
    pub version: u8,
    pub serial_number: String,
    pub not_before: String,
    pub not_after: String,
    pub signature_algorithm: String,
    /// Digest of the signature algorithm, when it has one this crate knows.
    pub digest: Option<DigestAlgorithm>,
}

impl CertificateSummary {
    /// Pre-fills a request from this summary, ready to be edited and re-signed.
    pub fn to_request_fields(&self) -> RequestFields {
        let (unlimited_path_len, max_path_len) = match self.max_path_len {
            Some(PathLenConstraint::Unlimited) => (true, None),
            Some(PathLenConstraint::Limited(n)) => (false, Some(n.to_string())),
            None => (false, None),
        };
        RequestFields {
            common_name: self.subject.common_name.clone(),
            organization: self.subject.organization.clone(),
            organization_unit: self.subject.organization_unit.clone(),
            country: self.subject.country.clone(),
            serial_number: Some(self.serial_number.clone()),
            not_before: Some(self.not_before.clone()),
            not_after: Some(self.not_after.clone()),
            is_ca: self.is_ca,
            unlimited_path_len,
            max_path_len,
            key_usage: self.key_usage,
            digest: self
                .digest
                .unwrap_or(DigestAlgorithm::Sha256)
                .name()
                .to_string(),
        }
    }
}

impl fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_algorithm_description)
    }
}

/// Parses a PEM or DER certificate into a [`CertificateSummary`].
///
/// # Errors
/// [`SelfCaError::ParseError`] for undecodable input,
/// [`SelfCaError::UnsupportedVersion`] for anything but v3, and
/// [`SelfCaError::MissingCommonName`] when the subject has no CN.
pub fn inspect(bytes: &[u8]) -> Result<CertificateSummary> {
    let cert = Certificate::load(bytes)?;
    let tbs = &cert.inner.tbs_certificate;

    match tbs.version {
        Version::V3 => {}
        Version::V2 => return Err(SelfCaError::UnsupportedVersion(2)),
        Version::V1 => return Err(SelfCaError::UnsupportedVersion(1)),
    }

    let subject = DistinguishedName::from_x509_name(&tbs.subject)?;

    let mut key_usage = KeyUsageFlags::default();
    let mut basic_constraints = None;
    for ext in tbs.extensions.iter().flatten() {
        if ext.extn_id == KeyUsage::OID {
            key_usage = KeyUsage::from_x509_extension_value(ext.extn_value.as_bytes())?.into();
        } else if ext.extn_id == BasicConstraints::OID {
            basic_constraints = Some(BasicConstraints::from_x509_extension_value(
                ext.extn_value.as_bytes(),
            )?);
        }
    }

    let is_ca = basic_constraints.is_some_and(|bc| bc.is_ca);
    let max_path_len = basic_constraints
        .filter(|bc| bc.is_ca)
        .map(|bc| match bc.max_path_length {
            Some(n) => PathLenConstraint::Limited(n),
            None => PathLenConstraint::Unlimited,
        });

    let signature_oid = cert.inner.signature_algorithm.oid;
    let signature_algorithm = describe_signature_oid(&signature_oid);
    let digest = SignatureAlgorithm::from_oid(&signature_oid).and_then(|alg| alg.digest());

    let (key_name, bits) = describe_key(&tbs.subject_public_key_info)?;
    let key_algorithm_description = format!(
        "{signature_algorithm} - KEY[ {key_name}: {bits} bits ] {}",
        if is_ca { "isCA" } else { "isNotCA" }
    );

    let summary = CertificateSummary {
        subject,
        key_usage,
        is_ca,
        max_path_len,
        key_algorithm_description,
        version: 3,
        serial_number: BigUint::from_bytes_be(tbs.serial_number.as_bytes()).to_str_radix(10),
        not_before: format_time(from_x509_time(&tbs.validity.not_before)?),
        not_after: format_time(from_x509_time(&tbs.validity.not_after)?),
        signature_algorithm,
        digest,
    };
    tracing::debug!(description = %summary, "inspected certificate");
    Ok(summary)
}

/// Reads and inspects the certificate at `path`.
pub fn inspect_file(path: impl AsRef<Path>) -> Result<CertificateSummary> {
    inspect(&storage::read_certificate_file(path.as_ref())?)
}

/// Key algorithm name and size in bits of a subject public key.
fn describe_key(spki: &SubjectPublicKeyInfoOwned) -> Result<(String, usize)> {
    let key_bits = spki.subject_public_key.raw_bytes();
    let oid = spki.algorithm.oid;
    if oid == rfc5912::RSA_ENCRYPTION {
        let public = rsa::RsaPublicKey::from_pkcs1_der(key_bits)
            .map_err(|e| SelfCaError::ParseError(e.to_string()))?;
        Ok(("RSA".to_string(), public.n().bits()))
    } else if oid == rfc5912::ID_EC_PUBLIC_KEY {
        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .and_then(|p| p.decode_as::<ObjectIdentifier>().ok());
        let bits = match curve {
            Some(c) if c == rfc5912::SECP_256_R_1 || c == SECP_256_K_1 => 256,
            Some(c) if c == rfc5912::SECP_384_R_1 => 384,
            Some(c) if c == rfc5912::SECP_521_R_1 => 521,
            // Uncompressed point: 0x04 || X || Y.
            _ => key_bits.len().saturating_sub(1) / 2 * 8,
        };
        Ok(("EC".to_string(), bits))
    } else if oid == rfc8410::ID_ED_25519 {
        Ok(("ED25519".to_string(), 256))
    } else {
        Ok((oid.to_string(), key_bits.len() * 8))
    }
}
