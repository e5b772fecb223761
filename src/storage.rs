//! File access for keys and certificates.

use std::fs;
use std::io::Write;
use std::path::Path;

use zeroize::Zeroizing;

use crate::cert::SignedCertificate;
use crate::error::{Result, SelfCaError};

/// Reads a private key file into a buffer that is wiped on drop.
pub fn read_key_file(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    let bytes = fs::read(path).map_err(|e| SelfCaError::storage(path, e))?;
    tracing::debug!(path = %path.display(), len = bytes.len(), "read key file");
    Ok(Zeroizing::new(bytes))
}

pub fn read_certificate_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| SelfCaError::storage(path, e))
}

/// Creates or truncates `path` and writes the PEM certificate to it.
pub fn write_certificate(path: &Path, certificate: &SignedCertificate) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| SelfCaError::storage(path, e))?;
    file.write_all(certificate.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| SelfCaError::storage(path, e))?;
    tracing::debug!(path = %path.display(), "wrote certificate");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.key");
        match read_key_file(&path) {
            Err(SelfCaError::StorageError { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("out.crt");
        let secret = p256::SecretKey::random(&mut rand_core::OsRng);
        let key = crate::key::KeyPair::load(
            pkcs8::EncodePrivateKey::to_pkcs8_der(&secret)
                .unwrap()
                .as_bytes(),
        )
        .unwrap();
        let request = crate::request::RequestFields::builder()
            .common_name("x")
            .build()
            .normalize()
            .unwrap();
        let cert = crate::issuer::sign(&request, &key).unwrap();
        assert!(matches!(
            write_certificate(&path, &cert),
            Err(SelfCaError::StorageError { .. })
        ));
    }
}
