use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SelfCaError;

/// Digest algorithms a certificate signature can be requested with.
///
/// The set is fixed; which members can actually be used depends on the
/// hash implementations linked into this crate, see [`DigestAlgorithm::is_available`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DigestAlgorithm {
    Md2,
    Md4,
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 8] = [
        DigestAlgorithm::Md2,
        DigestAlgorithm::Md4,
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha224,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md2 => "MD2",
            DigestAlgorithm::Md4 => "MD4",
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA1",
            DigestAlgorithm::Sha224 => "SHA224",
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha384 => "SHA384",
            DigestAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Whether a hash implementation is linked for this algorithm.
    ///
    /// There is no maintained RustCrypto implementation of MD2 or MD4 carrying
    /// an `AssociatedOid`, so those are never offered.
    pub fn is_available(&self) -> bool {
        !matches!(self, DigestAlgorithm::Md2 | DigestAlgorithm::Md4)
    }

    /// The algorithms that can be requested, in menu order.
    pub fn available() -> impl Iterator<Item = DigestAlgorithm> {
        Self::ALL.into_iter().filter(DigestAlgorithm::is_available)
    }

    /// Resolves a user-supplied name to an available digest.
    pub fn resolve(name: &str) -> Result<Self, SelfCaError> {
        name.parse::<DigestAlgorithm>()
            .ok()
            .filter(DigestAlgorithm::is_available)
            .ok_or_else(|| SelfCaError::UnknownDigest(name.to_string()))
    }

    /// Hashes `data`, returning the raw digest bytes.
    pub fn digest(&self, data: &[u8]) -> Result<Vec<u8>, SelfCaError> {
        use sha2::Digest;
        match self {
            DigestAlgorithm::Md5 => Ok(md5::Md5::digest(data).to_vec()),
            DigestAlgorithm::Sha1 => Ok(sha1::Sha1::digest(data).to_vec()),
            DigestAlgorithm::Sha224 => Ok(sha2::Sha224::digest(data).to_vec()),
            DigestAlgorithm::Sha256 => Ok(sha2::Sha256::digest(data).to_vec()),
            DigestAlgorithm::Sha384 => Ok(sha2::Sha384::digest(data).to_vec()),
            DigestAlgorithm::Sha512 => Ok(sha2::Sha512::digest(data).to_vec()),
            DigestAlgorithm::Md2 | DigestAlgorithm::Md4 => {
                Err(SelfCaError::UnknownDigest(self.name().to_string()))
            }
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = SelfCaError;

    /// Accepts the conventional names case-insensitively, with or without a
    /// dash (`SHA256`, `sha-256`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == normalized)
            .ok_or_else(|| SelfCaError::UnknownDigest(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_digests_exclude_md2_md4() {
        let names: Vec<&str> = DigestAlgorithm::available().map(|d| d.name()).collect();
        assert_eq!(
            names,
            vec!["MD5", "SHA1", "SHA224", "SHA256", "SHA384", "SHA512"]
        );
    }

    #[test]
    fn test_resolve() {
        assert_eq!(
            DigestAlgorithm::resolve("sha-256").unwrap(),
            DigestAlgorithm::Sha256
        );
        assert_eq!(
            DigestAlgorithm::resolve("MD2"),
            Err(SelfCaError::UnknownDigest("MD2".to_string()))
        );
        assert_eq!(
            DigestAlgorithm::resolve("WHIRLPOOL"),
            Err(SelfCaError::UnknownDigest("WHIRLPOOL".to_string()))
        );
    }

    #[test]
    fn test_digest_lengths() {
        assert_eq!(DigestAlgorithm::Md5.digest(b"abc").unwrap().len(), 16);
        assert_eq!(DigestAlgorithm::Sha1.digest(b"abc").unwrap().len(), 20);
        assert_eq!(DigestAlgorithm::Sha384.digest(b"abc").unwrap().len(), 48);
    }
}
