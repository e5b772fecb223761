#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::OnceLock;

use pkcs8::{EncodePrivateKey, LineEnding};
use rand_core::OsRng;
use selfca::RequestFields;
use selfca::cert::params::KeyUsageFlags;
use selfca::key::KeyPair;
use tempfile::TempDir;

/// A private key written to a temporary directory.
pub struct KeyFile {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl KeyFile {
    fn write(name: &str, contents: &[u8]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        Self { dir, path }
    }

    /// Sibling path inside the same temporary directory.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn load(&self) -> KeyPair {
        KeyPair::load(&std::fs::read(&self.path).unwrap()).unwrap()
    }
}

/// RSA keys are slow to generate in debug builds, so every test shares one.
pub fn rsa_2048() -> &'static rsa::RsaPrivateKey {
    static KEY: OnceLock<rsa::RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
}

pub fn write_rsa_key() -> KeyFile {
    let pem = rsa_2048().to_pkcs8_pem(LineEnding::LF).unwrap();
    KeyFile::write("ca.key", pem.as_bytes())
}

pub fn write_p256_pkcs8_key() -> KeyFile {
    let secret = p256::SecretKey::random(&mut OsRng);
    let pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
    KeyFile::write("ca.key", pem.as_bytes())
}

pub fn write_p256_sec1_key() -> KeyFile {
    let secret = p256::SecretKey::random(&mut OsRng);
    let pem = secret.to_sec1_pem(LineEnding::LF).unwrap();
    KeyFile::write("ca.key", pem.as_bytes())
}

/// CN=myCA, O=Org, C=US, keyCertSign|cRLSign, CA, unlimited, SHA256, serial 12345.
pub fn ca_fields() -> RequestFields {
    RequestFields::builder()
        .common_name("myCA")
        .organization("Org")
        .country("US")
        .serial_number("12345")
        .is_ca(true)
        .unlimited_path_len(true)
        .key_usage(KeyUsageFlags {
            key_cert_sign: true,
            crl_sign: true,
            ..Default::default()
        })
        .digest("SHA256")
        .build()
}
