//! use selfca::error::SelfCaError;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The signing stage at which an encoding or provider failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Rng,
    SubjectKey,
    SubjectName,
    IssuerName,
    SignatureAlgorithm,
    Serial,
    Validity,
    BasicConstraints,
    SubjectKeyIdentifier,
    AuthorityKeyIdentifier,
    KeyUsage,
    TbsEncoding,
    Sign,
    PemEncoding,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Rng => "rng",
            Stage::SubjectKey => "subject_key",
            Stage::SubjectName => "subject_name",
            Stage::IssuerName => "issuer_name",
            Stage::SignatureAlgorithm => "signature_algorithm",
            Stage::Serial => "serial",
            Stage::Validity => "validity",
            Stage::BasicConstraints => "basic_constraints",
            Stage::SubjectKeyIdentifier => "subject_key_identifier",
            Stage::AuthorityKeyIdentifier => "authority_key_identifier",
            Stage::KeyUsage => "key_usage",
            Stage::TbsEncoding => "tbs_encoding",
            Stage::Sign => "sign",
            Stage::PemEncoding => "pem_encoding",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents errors that can occur while building, signing or reading a certificate.
///
/// Validation variants are raised before any key material is touched; provider
/// variants carry the underlying library's message as `reason`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelfCaError {
    /// The Common Name (CN) is empty or could not be found.
    #[error("Common Name (CN) is empty")]
    MissingCommonName,

    /// A mandatory distinguished name component is absent.
    #[error("missing mandatory field: {0}")]
    MissingField(&'static str),

    /// A field exceeds its documented maximum length.
    #[error("field {field} exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    /// A field contains characters its encoding cannot carry.
    #[error("field {field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The requested digest is unknown or not available from the provider.
    #[error("unknown or unavailable digest algorithm: {0}")]
    UnknownDigest(String),

    /// The serial number is not a positive decimal integer of at most 20 octets.
    #[error("invalid serial number: {0}")]
    InvalidSerialNumber(String),

    /// The validity window is unparsable or empty.
    #[error("invalid validity window: {0}")]
    InvalidValidity(String),

    /// The private key could not be parsed as a supported key type.
    #[error("failed to load private key: {0}")]
    KeyLoadError(String),

    /// Encoding or signing failed at the given stage.
    #[error("certificate encoding failed at {stage}: {reason}")]
    EncodingError { stage: Stage, reason: String },

    /// A file could not be read or written.
    #[error("storage error on {}: {reason}", path.display())]
    StorageError { path: PathBuf, reason: String },

    /// The certificate could not be decoded.
    #[error("failed to parse certificate: {0}")]
    ParseError(String),

    /// The certificate is not an X.509 v3 certificate.
    #[error("certificate version must be v3, found v{0}")]
    UnsupportedVersion(u8),
}

impl SelfCaError {
    pub(crate) fn encoding(stage: Stage, err: impl fmt::Display) -> Self {
        SelfCaError::EncodingError {
            stage,
            reason: err.to_string(),
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        SelfCaError::StorageError {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

impl From<der::Error> for SelfCaError {
    /// Converts a `der::Error` into a `SelfCaError`.
    fn from(err: der::Error) -> Self {
        SelfCaError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SelfCaError>;
