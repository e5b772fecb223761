use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::SetOfVec;
use der::{Any, Tag, Tagged};
use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::{datetime, format_description};
use time::{OffsetDateTime, PrimitiveDateTime};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::{FlagSet, KeyUsage, KeyUsages, ToAndFromX509Extension};
use crate::error::{Result, SelfCaError, Stage};

pub const COUNTRY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
pub const ORGANIZATION_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
pub const ORGANIZATIONAL_UNIT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
pub const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// One component type of a [`DistinguishedName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnAttribute {
    Country,
    Organization,
    OrganizationalUnit,
    CommonName,
}

impl DnAttribute {
    /// Fixed serialization order.
    pub const ORDER: [DnAttribute; 4] = [
        DnAttribute::Country,
        DnAttribute::Organization,
        DnAttribute::OrganizationalUnit,
        DnAttribute::CommonName,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            DnAttribute::Country => "C",
            DnAttribute::Organization => "O",
            DnAttribute::OrganizationalUnit => "OU",
            DnAttribute::CommonName => "CN",
        }
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DnAttribute::Country => COUNTRY_NAME,
            DnAttribute::Organization => ORGANIZATION_NAME,
            DnAttribute::OrganizationalUnit => ORGANIZATIONAL_UNIT_NAME,
            DnAttribute::CommonName => COMMON_NAME,
        }
    }

    /// Maximum value length in characters.
    pub fn max_len(&self) -> usize {
        match self {
            DnAttribute::Country => 2,
            _ => 64,
        }
    }

    fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ORDER.into_iter().find(|attr| attr.oid() == *oid)
    }
}

/// Distinguished name of a self-signed certificate: subject and issuer alike.
///
/// Empty strings stand for absent components. Values must not contain commas,
/// the text form has no escaping.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinguishedName {
    #[builder(into)]
    pub common_name: String,
    #[builder(default, into)]
    #[serde(default)]
    pub country: String,
    #[builder(default, into)]
    #[serde(default)]
    pub organization: String,
    #[builder(default, into)]
    #[serde(default)]
    pub organization_unit: String,
}

impl DistinguishedName {
    pub fn get(&self, attr: DnAttribute) -> &str {
        match attr {
            DnAttribute::Country => &self.country,
            DnAttribute::Organization => &self.organization,
            DnAttribute::OrganizationalUnit => &self.organization_unit,
            DnAttribute::CommonName => &self.common_name,
        }
    }

    /// Present components in serialization order.
    pub fn components(&self) -> impl Iterator<Item = (DnAttribute, &str)> + '_ {
        DnAttribute::ORDER
            .into_iter()
            .map(|attr| (attr, self.get(attr)))
            .filter(|(_, value)| !value.is_empty())
    }

    /// Checks the length and character-set contracts of each component.
    ///
    /// Lengths are counted in characters. The country must also be a valid
    /// PrintableString since that is how it is encoded.
    pub fn validate(&self) -> Result<()> {
        if self.common_name.is_empty() {
            return Err(SelfCaError::MissingCommonName);
        }
        for (attr, value) in self.components() {
            if value.chars().count() > attr.max_len() {
                return Err(SelfCaError::FieldTooLong {
                    field: attr.short_name(),
                    max: attr.max_len(),
                });
            }
        }
        if der::asn1::PrintableStringRef::new(&self.country).is_err() {
            return Err(SelfCaError::InvalidField {
                field: DnAttribute::Country.short_name(),
                reason: format!("{:?} is not a PrintableString", self.country),
            });
        }
        Ok(())
    }

    /// Builds the text form, e.g. `C=US,O=Org,CN=myCA`.
    pub fn build(&self) -> Result<String> {
        if self.common_name.is_empty() {
            return Err(SelfCaError::MissingField("CN"));
        }
        Ok(self
            .components()
            .map(|(attr, value)| format!("{}={}", attr.short_name(), value))
            .collect::<Vec<_>>()
            .join(","))
    }

    /// Parses the text form.
    ///
    /// Each component is located on its own by its `TYPE=` prefix, so order
    /// and separator spacing do not matter. A prefix only counts at the start
    /// of the text or after a comma and optional spaces. A value runs up to
    /// the next comma.
    pub fn parse(text: &str) -> Result<Self> {
        let common_name =
            find_value(text, DnAttribute::CommonName).ok_or(SelfCaError::MissingCommonName)?;
        Ok(Self {
            common_name: common_name.to_string(),
            country: find_value(text, DnAttribute::Country)
                .unwrap_or_default()
                .to_string(),
            organization: find_value(text, DnAttribute::Organization)
                .unwrap_or_default()
                .to_string(),
            organization_unit: find_value(text, DnAttribute::OrganizationalUnit)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Converts the distinguished name to an X.509 name in C, O, OU, CN order.
    ///
    /// The country is encoded as a PrintableString, everything else as UTF8String.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        if self.common_name.is_empty() {
            return Err(SelfCaError::MissingField("CN"));
        }
        let rdns = self
            .components()
            .map(|(attr, value)| {
                let tag = match attr {
                    DnAttribute::Country => Tag::PrintableString,
                    _ => Tag::Utf8String,
                };
                if tag == Tag::PrintableString {
                    der::asn1::PrintableStringRef::new(value)?;
                }
                let atv = AttributeTypeAndValue {
                    oid: attr.oid(),
                    value: Any::new(tag, value.as_bytes().to_vec())?,
                };
                Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
            })
            .collect::<der::Result<Vec<_>>>()
            .map_err(|e| SelfCaError::encoding(Stage::SubjectName, e))?;
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 name by way of its text form.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self> {
        Self::parse(&render_x509_name(x509dn))
    }
}

fn find_value(text: &str, attr: DnAttribute) -> Option<&str> {
    let prefix = format!("{}=", attr.short_name());
    let mut from = 0;
    while let Some(offset) = text[from..].find(&prefix) {
        let start = from + offset;
        let before = text[..start].trim_end_matches(' ');
        let at_boundary = before.is_empty() || before.ends_with(',');
        if at_boundary {
            let rest = &text[start + prefix.len()..];
            let end = rest.find(',').unwrap_or(rest.len());
            return Some(&rest[..end]);
        }
        from = start + prefix.len();
    }
    None
}

/// Renders an X.509 name as `C=US, O=Org, CN=myCA` in encoding order.
///
/// Known attribute types use their short names, others their dotted OID.
/// UniversalString values are refused by the DER decoder before they get here.
pub fn render_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> String {
    let mut parts = Vec::new();
    for rdn in x509dn.0.iter() {
        for attr in rdn.0.iter() {
            let label = DnAttribute::from_oid(&attr.oid)
                .map(|a| a.short_name().to_string())
                .unwrap_or_else(|| attr.oid.to_string());
            parts.push(format!("{label}={}", attribute_text(&attr.value)));
        }
    }
    parts.join(", ")
}

/// Decodes a directory string by its tag. BMPString is UTF-16BE and
/// TeletexString is read as Latin-1; everything else is treated as UTF-8.
fn attribute_text(value: &Any) -> String {
    let bytes = value.value();
    match value.tag() {
        Tag::BmpString => char::decode_utf16(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
        )
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect(),
        Tag::TeletexString => bytes.iter().map(|b| char::from(*b)).collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Text form of certificate times, `YYYYMMDDhhmmss` in UTC.
pub const TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Default for Validity {
    /// 2020-01-01 to 2050-01-01.
    fn default() -> Self {
        Self {
            not_before: datetime!(2020-01-01 0:00 UTC),
            not_after: datetime!(2050-01-01 0:00 UTC),
        }
    }
}

impl Validity {
    /// Earliest and latest years a certificate time can be encoded with.
    pub const YEARS: std::ops::RangeInclusive<i32> = 1970..=9999;

    pub fn new(not_before: OffsetDateTime, not_after: OffsetDateTime) -> Result<Self> {
        check_year(not_before)?;
        check_year(not_after)?;
        if not_before >= not_after {
            return Err(SelfCaError::InvalidValidity(format!(
                "not before {} is not earlier than not after {}",
                format_time(not_before),
                format_time(not_after)
            )));
        }
        Ok(Self {
            not_before,
            not_after,
        })
    }
}

fn check_year(time: OffsetDateTime) -> Result<()> {
    let year = time.to_offset(time::UtcOffset::UTC).year();
    if Validity::YEARS.contains(&year) {
        Ok(())
    } else {
        Err(SelfCaError::InvalidValidity(format!(
            "year {year} is outside {}..={}",
            Validity::YEARS.start(),
            Validity::YEARS.end()
        )))
    }
}

pub fn parse_time(text: &str) -> Result<OffsetDateTime> {
    let time = PrimitiveDateTime::parse(text.trim(), TIME_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| SelfCaError::InvalidValidity(format!("{text:?}: {e}")))?;
    check_year(time)?;
    Ok(time)
}

pub fn format_time(time: OffsetDateTime) -> String {
    time.to_offset(time::UtcOffset::UTC)
        .format(TIME_FORMAT)
        .unwrap_or_else(|_| time.to_string())
}

/// Basic constraints path length of a CA certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathLenConstraint {
    /// No pathLenConstraint is encoded.
    Unlimited,
    Limited(u8),
}

impl PathLenConstraint {
    pub const MAX: u8 = 127;

    /// `-1` means unlimited; anything else is clamped to `0..=127`.
    pub fn from_i64(value: i64) -> Self {
        if value == -1 {
            PathLenConstraint::Unlimited
        } else {
            PathLenConstraint::Limited(value.clamp(0, Self::MAX as i64) as u8)
        }
    }

    /// `-1` for unlimited, else the limit.
    pub fn as_i64(&self) -> i64 {
        match self {
            PathLenConstraint::Unlimited => -1,
            PathLenConstraint::Limited(n) => *n as i64,
        }
    }

    pub fn limit(&self) -> Option<u8> {
        match self {
            PathLenConstraint::Unlimited => None,
            PathLenConstraint::Limited(n) => Some(*n),
        }
    }
}

/// The seven key usage bits a request can set, one flag each.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyUsageFlags {
    pub digital_signature: bool,
    pub non_repudiation: bool,
    pub key_encipherment: bool,
    pub data_encipherment: bool,
    pub key_agreement: bool,
    pub key_cert_sign: bool,
    pub crl_sign: bool,
}

impl KeyUsageFlags {
    pub fn is_empty(&self) -> bool {
        KeyUsage::from(*self).0.is_empty()
    }
}

impl From<KeyUsageFlags> for KeyUsage {
    fn from(flags: KeyUsageFlags) -> Self {
        let mut set = FlagSet::<KeyUsages>::empty();
        let bits = [
            (flags.digital_signature, KeyUsages::DigitalSignature),
            (flags.non_repudiation, KeyUsages::NonRepudiation),
            (flags.key_encipherment, KeyUsages::KeyEncipherment),
            (flags.data_encipherment, KeyUsages::DataEncipherment),
            (flags.key_agreement, KeyUsages::KeyAgreement),
            (flags.key_cert_sign, KeyUsages::KeyCertSign),
            (flags.crl_sign, KeyUsages::CRLSign),
        ];
        for (enabled, usage) in bits {
            if enabled {
                set |= usage;
            }
        }
        KeyUsage(set)
    }
}

impl From<KeyUsage> for KeyUsageFlags {
    fn from(usage: KeyUsage) -> Self {
        let set = usage.0;
        Self {
            digital_signature: set.contains(KeyUsages::DigitalSignature),
            non_repudiation: set.contains(KeyUsages::NonRepudiation),
            key_encipherment: set.contains(KeyUsages::KeyEncipherment),
            data_encipherment: set.contains(KeyUsages::DataEncipherment),
            key_agreement: set.contains(KeyUsages::KeyAgreement),
            key_cert_sign: set.contains(KeyUsages::KeyCertSign),
            crl_sign: set.contains(KeyUsages::CRLSign),
        }
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension, reporting
    /// encoding failures against `stage`.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: E,
        critical: bool,
        stage: Stage,
    ) -> Result<Self> {
        let value = extension
            .to_x509_extension_value()
            .map_err(|e| SelfCaError::encoding(stage, e))?;
        Ok(Self {
            oid: E::OID,
            critical,
            value,
        })
    }
}
