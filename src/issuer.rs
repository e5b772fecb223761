use std::path::Path;

use der::Encode;
use der::asn1::BitString;
use rand_core::{OsRng, RngCore};
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, SubjectKeyIdentifier, key_identifier,
};
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::cert::{Certificate, SignatureAlgorithm, SignedCertificate};
use crate::error::{Result, SelfCaError, Stage};
use crate::key::KeyPair;
use crate::request::CertificateRequest;
use crate::storage;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> &DistinguishedName;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Issues a certificate for `subject_public_key_info` from a validated request.
    ///
    /// Extensions are emitted in a fixed order: basic constraints, subject key
    /// identifier, authority key identifier, then key usage when any bit is set.
    ///
    /// # Errors
    /// Fails with [`SelfCaError::EncodingError`] naming the first stage that
    /// could not be completed. Nothing is returned on failure.
    fn issue(
        &self,
        request: &CertificateRequest,
        subject_public_key_info: SubjectPublicKeyInfoOwned,
    ) -> Result<Certificate> {
        let mut rng = OsRng;
        let mut scratch = [0u8; 16];
        rng.try_fill_bytes(&mut scratch)
            .map_err(|e| SelfCaError::encoding(Stage::Rng, e))?;
        tracing::debug!(stage = %Stage::Rng, "random source ready");

        let issuer_key_info = self.signing_key().as_spki()?;
        tracing::debug!(
            stage = %Stage::SubjectKey,
            algorithm = self.signing_key().algorithm_name(),
            bits = self.signing_key().bits(),
            "issuer key encoded"
        );

        let signature_algorithm = SignatureAlgorithm::for_key(self.signing_key(), request.digest)?;
        tracing::debug!(
            stage = %Stage::SignatureAlgorithm,
            algorithm = %signature_algorithm.description(),
            "signature algorithm selected"
        );

        let basic_constraints = BasicConstraints {
            is_ca: request.is_ca,
            max_path_length: if request.is_ca {
                request.max_path_len.limit()
            } else {
                None
            },
        };
        let subject_key_id = SubjectKeyIdentifier {
            key_identifier: key_identifier(&subject_public_key_info.subject_public_key),
        };
        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: key_identifier(&issuer_key_info.subject_public_key),
        };

        let mut extensions = vec![
            ExtensionParam::from_extension(
                basic_constraints,
                request.is_ca,
                Stage::BasicConstraints,
            )?,
            ExtensionParam::from_extension(subject_key_id, false, Stage::SubjectKeyIdentifier)?,
            ExtensionParam::from_extension(
                authority_key_id,
                false,
                Stage::AuthorityKeyIdentifier,
            )?,
        ];
        if !request.key_usage.0.is_empty() {
            extensions.push(ExtensionParam::from_extension(
                request.key_usage,
                true,
                Stage::KeyUsage,
            )?);
        }
        tracing::debug!(count = extensions.len(), "extensions encoded");

        let tbs_cert = TbsCertificate {
            serial_number: request.serial_number.as_bytes().to_vec(),
            signature_algorithm,
            issuer: self.issuer_name().clone(),
            validity: request.validity.clone(),
            subject: request.subject.clone(),
            subject_public_key_info,
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| SelfCaError::encoding(Stage::TbsEncoding, e))?;
        tracing::debug!(stage = %Stage::TbsEncoding, len = tbs_der.len(), "tbs encoded");

        let signature = self
            .signing_key()
            .sign_data(&tbs_der, request.digest, &mut rng)?;
        tracing::debug!(stage = %Stage::Sign, len = signature.len(), "tbs signed");

        let cert_inner = CertificateInner {
            signature_algorithm: tbs_cert_inner.signature.clone(),
            tbs_certificate: tbs_cert_inner,
            signature: BitString::from_bytes(&signature)
                .map_err(|e| SelfCaError::encoding(Stage::Sign, e))?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// An issuer whose name and key are the subject's own.
pub struct SelfIssuer<'a> {
    pub name: &'a DistinguishedName,
    pub key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> &DistinguishedName {
        self.name
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// Issues a self-signed certificate for `request` with `key` and returns it as PEM.
pub fn sign(request: &CertificateRequest, key: &KeyPair) -> Result<SignedCertificate> {
    let issuer = SelfIssuer {
        name: &request.subject,
        key,
    };
    let certificate = issuer.issue(request, key.as_spki()?)?;
    let signed = SignedCertificate::from_certificate(&certificate)?;
    tracing::info!(
        subject = %request.subject.build()?,
        serial = %request.serial_number,
        key = key.algorithm_name(),
        "issued self-signed certificate"
    );
    Ok(signed)
}

/// Loads the key at `key_path`, signs `request`, and writes the PEM to `cert_path`.
///
/// The output file is only created once signing has succeeded.
pub fn sign_to_file(
    request: &CertificateRequest,
    key_path: impl AsRef<Path>,
    cert_path: impl AsRef<Path>,
) -> Result<SignedCertificate> {
    let key_bytes = storage::read_key_file(key_path.as_ref())?;
    let key = KeyPair::load(&key_bytes)?;
    let signed = sign(request, &key)?;
    storage::write_certificate(cert_path.as_ref(), &signed)?;
    Ok(signed)
}
