//! selfca command line
//!
//! Signs self-signed CA certificates for existing keys and inspects
//! certificates.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use selfca::cert::params::KeyUsageFlags;
use selfca::digest::DigestAlgorithm;
use selfca::{CertificateSummary, RequestFields};

#[derive(Parser, Debug)]
#[command(name = "selfca")]
#[command(about = "Issue self-signed CA certificates from existing keys")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign a self-signed certificate with an existing private key
    ///
    /// Fields are layered: built-in defaults, then the template certificate,
    /// then the request file, then command-line flags.
    Sign {
        /// Private key, PEM or DER
        #[arg(long, short = 'k')]
        key: PathBuf,

        /// Output certificate (default: the key path with a .crt extension)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Request fields as JSON
        #[arg(long)]
        request: Option<PathBuf>,

        /// Existing certificate whose fields pre-fill the request
        #[arg(long)]
        template: Option<PathBuf>,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Print a certificate's fields
    Inspect {
        cert: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Sign a .key file to the sibling .crt, or inspect any other file
    Open {
        file: PathBuf,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// List the available digest algorithms
    Digests,
}

#[derive(Args, Debug, Default, Clone)]
struct FieldArgs {
    /// Common Name (CN)
    #[arg(long)]
    cn: Option<String>,

    /// Organization (O)
    #[arg(long)]
    org: Option<String>,

    /// Organizational Unit (OU)
    #[arg(long)]
    ou: Option<String>,

    /// Two-letter country code (C)
    #[arg(long)]
    country: Option<String>,

    /// Decimal serial number (default: random)
    #[arg(long)]
    serial: Option<String>,

    /// YYYYMMDDhhmmss, UTC
    #[arg(long)]
    not_before: Option<String>,

    /// YYYYMMDDhhmmss, UTC
    #[arg(long)]
    not_after: Option<String>,

    /// Issue a certificate that is not a CA
    #[arg(long)]
    not_ca: bool,

    /// Omit the path length constraint
    #[arg(long, conflicts_with = "max_path_len")]
    unlimited_path_len: bool,

    /// Maximum number of intermediate CAs below this one
    #[arg(long)]
    max_path_len: Option<String>,

    /// Key usage bits, comma separated; replaces any inherited set
    #[arg(long, value_enum, value_delimiter = ',')]
    key_usage: Vec<KeyUsageArg>,

    /// Digest algorithm, see `selfca digests`
    #[arg(long)]
    digest: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum KeyUsageArg {
    DigitalSignature,
    NonRepudiation,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    KeyCertSign,
    CrlSign,
}

impl FieldArgs {
    fn apply(&self, fields: &mut RequestFields) {
        let text_fields = [
            (&self.cn, &mut fields.common_name),
            (&self.org, &mut fields.organization),
            (&self.ou, &mut fields.organization_unit),
            (&self.country, &mut fields.country),
        ];
        for (arg, field) in text_fields {
            if let Some(value) = arg {
                *field = value.clone();
            }
        }
        if self.serial.is_some() {
            fields.serial_number = self.serial.clone();
        }
        if self.not_before.is_some() {
            fields.not_before = self.not_before.clone();
        }
        if self.not_after.is_some() {
            fields.not_after = self.not_after.clone();
        }
        if self.not_ca {
            fields.is_ca = false;
        }
        if self.unlimited_path_len {
            fields.unlimited_path_len = true;
        } else if self.max_path_len.is_some() {
            fields.unlimited_path_len = false;
            fields.max_path_len = self.max_path_len.clone();
        }
        if !self.key_usage.is_empty() {
            fields.key_usage = key_usage_flags(&self.key_usage);
        }
        if let Some(digest) = &self.digest {
            fields.digest = digest.clone();
        }
    }
}

fn key_usage_flags(args: &[KeyUsageArg]) -> KeyUsageFlags {
    let mut flags = KeyUsageFlags::default();
    for arg in args {
        let bit = match arg {
            KeyUsageArg::DigitalSignature => &mut flags.digital_signature,
            KeyUsageArg::NonRepudiation => &mut flags.non_repudiation,
            KeyUsageArg::KeyEncipherment => &mut flags.key_encipherment,
            KeyUsageArg::DataEncipherment => &mut flags.data_encipherment,
            KeyUsageArg::KeyAgreement => &mut flags.key_agreement,
            KeyUsageArg::KeyCertSign => &mut flags.key_cert_sign,
            KeyUsageArg::CrlSign => &mut flags.crl_sign,
        };
        *bit = true;
    }
    flags
}

/// Overlays the keys present in a JSON request file onto `fields`.
fn merge_request_file(fields: RequestFields, path: &Path) -> Result<RequestFields> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    let overlay: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    let Some(overlay) = overlay.as_object() else {
        anyhow::bail!("{} must contain a JSON object", path.display());
    };

    let mut base = serde_json::to_value(fields)?;
    if let Some(base) = base.as_object_mut() {
        for (key, value) in overlay {
            base.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(base)
        .with_context(|| format!("Invalid request fields in {}", path.display()))
}

fn sign(key: &Path, out: &Path, fields: &RequestFields) -> Result<()> {
    let request = fields.normalize().context("Invalid certificate request")?;
    let signed = selfca::sign_to_file(&request, key, out)
        .with_context(|| format!("Failed to sign {}", out.display()))?;
    let summary = selfca::inspect(signed.as_bytes())?;
    println!("{}", out.display());
    println!("{summary}");
    Ok(())
}

fn print_summary(summary: &CertificateSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!("{summary}");
    println!("subject:       {}", summary.subject.build()?);
    println!("serial:        {}", summary.serial_number);
    println!("not before:    {}", summary.not_before);
    println!("not after:     {}", summary.not_after);
    let path_len = match summary.max_path_len {
        Some(constraint) => constraint.as_i64().to_string(),
        None => "-".to_string(),
    };
    println!("max path len:  {path_len}");
    let usage = summary.key_usage;
    let bits = [
        ("digitalSignature", usage.digital_signature),
        ("nonRepudiation", usage.non_repudiation),
        ("keyEncipherment", usage.key_encipherment),
        ("dataEncipherment", usage.data_encipherment),
        ("keyAgreement", usage.key_agreement),
        ("keyCertSign", usage.key_cert_sign),
        ("cRLSign", usage.crl_sign),
    ];
    let names: Vec<_> = bits
        .iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| *name)
        .collect();
    println!("key usage:     {}", names.join(", "));
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("selfca=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sign {
            key,
            out,
            request,
            template,
            fields: args,
        } => {
            let mut fields = match &template {
                Some(path) => selfca::inspect_file(path)
                    .with_context(|| format!("Failed to read template {}", path.display()))?
                    .to_request_fields(),
                None => RequestFields::default(),
            };
            if let Some(path) = &request {
                fields = merge_request_file(fields, path)?;
            }
            args.apply(&mut fields);
            let out = out.unwrap_or_else(|| key.with_extension("crt"));
            sign(&key, &out, &fields)
        }
        Commands::Inspect { cert, json } => {
            let summary = selfca::inspect_file(&cert)
                .with_context(|| format!("Failed to inspect {}", cert.display()))?;
            print_summary(&summary, json)
        }
        Commands::Open { file, fields: args } => {
            let is_key = file
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("key"));
            if is_key {
                let mut fields = RequestFields::default();
                args.apply(&mut fields);
                sign(&file, &file.with_extension("crt"), &fields)
            } else {
                let summary = selfca::inspect_file(&file)
                    .with_context(|| format!("Failed to inspect {}", file.display()))?;
                print_summary(&summary, false)
            }
        }
        Commands::Digests => {
            for digest in DigestAlgorithm::available() {
                println!("{digest}");
            }
            Ok(())
        }
    }
}
