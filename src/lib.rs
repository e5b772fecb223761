//! # selfca - Self-Signed CA Certificates from Existing Keys
//!
//! selfca issues self-signed X.509 v3 certificates for a private key you
//! already have, and reads existing certificates back into the same request
//! form so they can be edited and signed again. It is built entirely on the
//! RustCrypto libraries.
//!
//! ## Supported Key Types
//!
//! - **RSA**: PKCS#8 or PKCS#1, any size the `rsa` crate accepts
//! - **ECDSA**: P-256 and P-384, PKCS#8 or SEC1
//! - **Ed25519**: PKCS#8
//!
//! Keys may be PEM or DER. Encrypted PKCS#8 keys are not supported.
//!
//! ## Certificate Layout
//!
//! Issuer and subject are the same name, built in C, O, OU, CN order. The
//! extensions are always written in this order:
//!
//! 1. basicConstraints (critical for a CA)
//! 2. subjectKeyIdentifier (SHA-1 of the public key bits)
//! 3. authorityKeyIdentifier (same identifier)
//! 4. keyUsage (critical, only if a bit is set)
//!
//! ## Quick Start
//!
//! ### Signing a Certificate
//!
//! ```rust,no_run
//! use selfca::{issuer, request::RequestFields};
//!
//! # fn main() -> Result<(), selfca::error::SelfCaError> {
//! let request = RequestFields::builder()
//!     .common_name("myCA")
//!     .organization("Org")
//!     .country("US")
//!     .unlimited_path_len(true)
//!     .build()
//!     .normalize()?;
//!
//! let signed = issuer::sign_to_file(&request, "ca.key", "ca.crt")?;
//! println!("{signed}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Inspecting and Re-signing
//!
//! ```rust,no_run
//! use selfca::{inspect, issuer};
//!
//! # fn main() -> Result<(), selfca::error::SelfCaError> {
//! let summary = inspect::inspect_file("ca.crt")?;
//! println!("{summary}");
//!
//! let mut fields = summary.to_request_fields();
//! fields.not_after = Some("20600101000000".to_string());
//! issuer::sign_to_file(&fields.normalize()?, "ca.key", "ca.crt")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::SelfCaError`]. Request problems
//! are reported before any key is read or file written:
//!
//! ```rust
//! use selfca::{error::SelfCaError, request::RequestFields};
//!
//! let fields = RequestFields::builder().common_name("myCA").digest("MD4").build();
//! match fields.normalize() {
//!     Err(SelfCaError::UnknownDigest(name)) => assert_eq!(name, "MD4"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`request`]: request fields, validation and normalization
//! - [`issuer`]: self-signed certificate issuing
//! - [`inspect`]: reading certificates back into request form
//! - [`cert`]: certificate types, names, extensions and signature algorithms
//! - [`key`]: private key loading and signing
//! - [`digest`]: the digest algorithms known to the crate
//! - [`storage`]: key and certificate files
//! - [`error`]: error types
//! - [`tbs_certificate`]: low-level certificate structure

pub mod cert;
pub mod digest;
pub mod error;
pub mod inspect;
pub mod issuer;
pub mod key;
mod pem_utils;
pub mod request;
pub mod storage;
pub mod tbs_certificate;

pub use cert::SignedCertificate;
pub use error::{Result, SelfCaError};
pub use inspect::{CertificateSummary, inspect, inspect_file};
pub use issuer::{sign, sign_to_file};
pub use request::{CertificateRequest, RequestFields};
