//! Validation and normalization of certificate requests.
//!
//! [`RequestFields`] is the raw record a caller collects (from a form, a JSON
//! file or command-line flags); [`RequestFields::normalize`] turns it into a
//! [`CertificateRequest`] or reports the first problem. No key material or
//! file is touched here.

use bon::Builder;
use rsa::BigUint;
use serde::{Deserialize, Serialize};

use crate::cert::extensions::KeyUsage;
use crate::cert::params::{DistinguishedName, KeyUsageFlags, PathLenConstraint, Validity, parse_time};
use crate::digest::DigestAlgorithm;
use crate::error::{Result, SelfCaError};

/// Raw certificate request fields, as entered by the user.
///
/// Text fields that are empty count as absent.
#[derive(Clone, Debug, Builder, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestFields {
    #[builder(default, into)]
    pub common_name: String,
    #[builder(default, into)]
    pub organization: String,
    #[builder(default, into)]
    pub organization_unit: String,
    #[builder(default, into)]
    pub country: String,
    /// Decimal serial number; generated when absent.
    #[builder(into)]
    pub serial_number: Option<String>,
    /// `YYYYMMDDhhmmss`, UTC.
    #[builder(into)]
    pub not_before: Option<String>,
    /// `YYYYMMDDhhmmss`, UTC.
    #[builder(into)]
    pub not_after: Option<String>,
    #[builder(default = true)]
    pub is_ca: bool,
    #[builder(default)]
    pub unlimited_path_len: bool,
    /// Numeric text; read like C `atoi`, so garbage reads as 0.
    #[builder(into)]
    pub max_path_len: Option<String>,
    #[builder(default)]
    pub key_usage: KeyUsageFlags,
    #[builder(default = DigestAlgorithm::Sha256.name().to_string(), into)]
    pub digest: String,
}

impl Default for RequestFields {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A validated request, ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateRequest {
    pub subject: DistinguishedName,
    pub serial_number: SerialNumber,
    pub validity: Validity,
    pub is_ca: bool,
    pub max_path_len: PathLenConstraint,
    pub key_usage: KeyUsage,
    pub digest: DigestAlgorithm,
}

impl RequestFields {
    /// Validates the fields and produces the canonical request.
    pub fn normalize(&self) -> Result<CertificateRequest> {
        if self.common_name.is_empty() {
            return Err(SelfCaError::MissingCommonName);
        }

        let subject = DistinguishedName {
            common_name: self.common_name.clone(),
            country: self.country.clone(),
            organization: self.organization.clone(),
            organization_unit: self.organization_unit.clone(),
        };
        subject.validate()?;

        let serial_number = match self.serial_number.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => SerialNumber::parse(text)?,
            _ => SerialNumber::generate(),
        };

        let defaults = Validity::default();
        let not_before = match non_empty(&self.not_before) {
            Some(text) => parse_time(text)?,
            None => defaults.not_before,
        };
        let not_after = match non_empty(&self.not_after) {
            Some(text) => parse_time(text)?,
            None => defaults.not_after,
        };
        let validity = Validity::new(not_before, not_after)?;

        let max_path_len = if self.unlimited_path_len {
            PathLenConstraint::Unlimited
        } else {
            PathLenConstraint::from_i64(parse_leading_int(
                self.max_path_len.as_deref().unwrap_or_default(),
            ))
        };

        let digest = DigestAlgorithm::resolve(&self.digest)?;

        let request = CertificateRequest {
            subject,
            serial_number,
            validity,
            is_ca: self.is_ca,
            max_path_len,
            key_usage: KeyUsage::from(self.key_usage),
            digest,
        };
        tracing::debug!(
            subject = %request.subject.build()?,
            serial = %request.serial_number,
            digest = %request.digest,
            "normalized certificate request"
        );
        Ok(request)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Reads a leading, optionally signed, decimal integer the way C `atoi` does:
/// leading whitespace is skipped, parsing stops at the first non-digit, and
/// text without digits reads as 0. Out-of-range values saturate.
fn parse_leading_int(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add((d - b'0') as i64)
        });
    if negative { -magnitude } else { magnitude }
}

/// A positive certificate serial number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialNumber {
    decimal: String,
    bytes: Vec<u8>,
}

impl SerialNumber {
    /// RFC 5280 caps the encoded INTEGER at 20 octets, sign bit included.
    pub const MAX_BITS: usize = 159;

    /// Parses a positive decimal serial number.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SelfCaError::InvalidSerialNumber(format!(
                "{text:?} is not a decimal number"
            )));
        }
        let value = BigUint::parse_bytes(text.as_bytes(), 10).ok_or_else(|| {
            SelfCaError::InvalidSerialNumber(format!("{text:?} is not a decimal number"))
        })?;
        Self::from_biguint(value)
    }

    /// Draws a fresh 127-bit positive serial number from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let value = (rand::random::<u128>() >> 1) | 1;
        let bytes = value.to_be_bytes();
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        Self {
            decimal: value.to_string(),
            bytes: bytes[start..].to_vec(),
        }
    }

    fn from_biguint(value: BigUint) -> Result<Self> {
        if value.bits() == 0 {
            return Err(SelfCaError::InvalidSerialNumber(
                "serial number must be positive".to_string(),
            ));
        }
        if value.bits() > Self::MAX_BITS {
            return Err(SelfCaError::InvalidSerialNumber(format!(
                "serial number exceeds {} bits",
                Self::MAX_BITS
            )));
        }
        Ok(Self {
            decimal: value.to_str_radix(10),
            bytes: value.to_bytes_be(),
        })
    }

    pub fn as_decimal(&self) -> &str {
        &self.decimal
    }

    /// Big-endian magnitude without leading zeros.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.decimal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::KeyUsages;

    fn fields() -> RequestFields {
        RequestFields::builder()
            .common_name("myCA")
            .organization("Org")
            .country("US")
            .serial_number("12345")
            .build()
    }

    #[test]
    fn test_defaults() {
        let request = fields().normalize().unwrap();
        assert!(request.is_ca);
        assert_eq!(request.digest, DigestAlgorithm::Sha256);
        assert_eq!(request.validity, Validity::default());
        assert_eq!(request.max_path_len, PathLenConstraint::Limited(0));
        assert!(request.key_usage.0.is_empty());
        assert_eq!(request.serial_number.as_decimal(), "12345");
        assert_eq!(request.serial_number.as_bytes(), &[0x30, 0x39]);
    }

    #[test]
    fn test_missing_common_name() {
        let mut raw = fields();
        raw.common_name.clear();
        assert_eq!(raw.normalize(), Err(SelfCaError::MissingCommonName));
    }

    #[test]
    fn test_field_length_contracts() {
        let mut raw = fields();
        raw.country = "USA".to_string();
        assert_eq!(
            raw.normalize(),
            Err(SelfCaError::FieldTooLong {
                field: "C",
                max: 2
            })
        );

        let mut raw = fields();
        raw.organization_unit = "x".repeat(65);
        assert_eq!(
            raw.normalize(),
            Err(SelfCaError::FieldTooLong {
                field: "OU",
                max: 64
            })
        );

        let mut raw = fields();
        raw.common_name = "é".repeat(64);
        assert!(raw.normalize().is_ok());
    }

    #[test]
    fn test_country_charset_checked_before_signing() {
        let mut raw = fields();
        raw.country = "U@".to_string();
        assert!(matches!(
            raw.normalize(),
            Err(SelfCaError::InvalidField { field: "C", .. })
        ));
    }

    #[test]
    fn test_path_len_rules() {
        let mut raw = fields();
        raw.unlimited_path_len = true;
        raw.max_path_len = Some("9".to_string());
        assert_eq!(
            raw.normalize().unwrap().max_path_len,
            PathLenConstraint::Unlimited
        );

        raw.unlimited_path_len = false;
        assert_eq!(
            raw.normalize().unwrap().max_path_len,
            PathLenConstraint::Limited(9)
        );

        raw.max_path_len = Some("300".to_string());
        assert_eq!(
            raw.normalize().unwrap().max_path_len,
            PathLenConstraint::Limited(127)
        );

        raw.max_path_len = Some("abc".to_string());
        assert_eq!(
            raw.normalize().unwrap().max_path_len,
            PathLenConstraint::Limited(0)
        );

        raw.max_path_len = Some("-1".to_string());
        assert_eq!(
            raw.normalize().unwrap().max_path_len,
            PathLenConstraint::Unlimited
        );
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(parse_leading_int("  42abc"), 42);
        assert_eq!(parse_leading_int("-3"), -3);
        assert_eq!(parse_leading_int(""), 0);
        assert_eq!(parse_leading_int("x1"), 0);
        assert_eq!(parse_leading_int("99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_key_usage_from_flags() {
        let mut raw = fields();
        raw.key_usage.key_cert_sign = true;
        raw.key_usage.crl_sign = true;
        assert_eq!(
            raw.normalize().unwrap().key_usage,
            KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign)
        );
    }

    #[test]
    fn test_unknown_digest() {
        let mut raw = fields();
        raw.digest = "MD4".to_string();
        assert_eq!(
            raw.normalize(),
            Err(SelfCaError::UnknownDigest("MD4".to_string()))
        );
    }

    #[test]
    fn test_validity_fields() {
        let mut raw = fields();
        raw.not_before = Some("20300101000000".to_string());
        raw.not_after = Some("20250101000000".to_string());
        assert!(matches!(
            raw.normalize(),
            Err(SelfCaError::InvalidValidity(_))
        ));

        raw.not_after = Some("bogus".to_string());
        assert!(matches!(
            raw.normalize(),
            Err(SelfCaError::InvalidValidity(_))
        ));

        let mut raw = fields();
        raw.not_before = Some("19600101000000".to_string());
        assert!(matches!(
            raw.normalize(),
            Err(SelfCaError::InvalidValidity(_))
        ));
    }

    #[test]
    fn test_serial_numbers() {
        assert!(matches!(
            SerialNumber::parse("12a"),
            Err(SelfCaError::InvalidSerialNumber(_))
        ));
        assert!(matches!(
            SerialNumber::parse("0"),
            Err(SelfCaError::InvalidSerialNumber(_))
        ));
        // 2^159 needs 21 octets once the sign bit is added.
        let too_big = "730750818665451459101842416358141509827966271488";
        assert!(matches!(
            SerialNumber::parse(too_big),
            Err(SelfCaError::InvalidSerialNumber(_))
        ));
        let big = "123456789012345678901234567890";
        assert_eq!(SerialNumber::parse(big).unwrap().as_decimal(), big);

        let generated = SerialNumber::generate();
        assert!(!generated.as_bytes().is_empty());
        assert_eq!(
            SerialNumber::parse(generated.as_decimal()).unwrap(),
            generated
        );
        assert_ne!(SerialNumber::generate(), generated);
    }

    #[test]
    fn test_fields_from_json() {
        let raw: RequestFields = serde_json::from_str(
            r#"{"common_name": "myCA", "unlimited_path_len": true,
                "key_usage": {"key_cert_sign": true}}"#,
        )
        .unwrap();
        assert!(raw.is_ca);
        assert_eq!(raw.digest, "SHA256");
        let request = raw.normalize().unwrap();
        assert_eq!(request.max_path_len, PathLenConstraint::Unlimited);
        assert_eq!(request.key_usage, KeyUsage(KeyUsages::KeyCertSign.into()));
    }
}
