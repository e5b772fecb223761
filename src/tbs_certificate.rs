use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use time::{OffsetDateTime, UtcOffset};
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Time;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::error::{Result, SelfCaError, Stage};

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian magnitude of the serial number.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - Extensions, encoded in the order given.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: DistinguishedName,
    pub validity: Validity,
    pub subject: DistinguishedName,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    ///
    /// Each field is converted in certificate order and a failure is reported
    /// against the stage it happened in.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let subject = self.subject.as_x509_name()?;
        let issuer = self.issuer.as_x509_name().map_err(|e| match e {
            SelfCaError::EncodingError { reason, .. } => {
                SelfCaError::encoding(Stage::IssuerName, reason)
            }
            other => other,
        })?;

        let signature: x509_cert::spki::AlgorithmIdentifierOwned =
            self.signature_algorithm.try_into()?;

        let serial_number = SerialNumber::new(self.serial_number.as_slice())
            .map_err(|e| SelfCaError::encoding(Stage::Serial, e))?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)
                .map_err(|e| SelfCaError::encoding(Stage::Validity, e))?,
            not_after: to_x509_time(self.validity.not_after)
                .map_err(|e| SelfCaError::encoding(Stage::Validity, e))?,
        };

        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())
                        .map_err(|e| SelfCaError::encoding(Stage::TbsEncoding, e))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature,
            issuer,
            validity,
            subject,
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }
}

/// Encodes a timestamp as UTCTime before 2050 and as GeneralizedTime from
/// 2050 on, as RFC 5280 requires.
pub fn to_x509_time(time: OffsetDateTime) -> der::Result<Time> {
    let time = time.to_offset(UtcOffset::UTC);
    let year = u16::try_from(time.year()).map_err(|_| der::ErrorKind::DateTime)?;
    let date_time = der::DateTime::new(
        year,
        u8::from(time.month()),
        time.day(),
        time.hour(),
        time.minute(),
        time.second(),
    )?;
    if year < 2050 {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

pub fn from_x509_time(time: &Time) -> Result<OffsetDateTime> {
    let secs = i64::try_from(time.to_unix_duration().as_secs())
        .map_err(|e| SelfCaError::ParseError(e.to_string()))?;
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| SelfCaError::ParseError(e.to_string()))
}
