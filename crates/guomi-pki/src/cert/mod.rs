//! Certificate model bridge.
//!
//! Standard X.509 tooling and the national algorithm ecosystem each carry
//! their own certificate representation with incompatible algorithm tag
//! namespaces. This module bridges the two: every certificate decodes into a
//! canonical [`CertificateRecord`], and the boundary representations
//! [`standard::StandardCertificate`] and [`national::NationalCertificate`]
//! are pure codecs over that record. Converting between the two sides is
//! total and lossless in both directions.
use std::{net::IpAddr, time::SystemTime};

use snafu::{Snafu, ensure};
use tracing::instrument;
use x509_cert::der::asn1::ObjectIdentifier;

pub mod decoder;
pub mod national;
pub mod standard;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("input must contain exactly one PEM-encoded certificate"))]
    InvalidPem { source: x509_cert::der::Error },

    #[snafu(display("unexpected PEM label {label:?}, expected CERTIFICATE"))]
    UnexpectedPemLabel { label: String },

    #[snafu(display("failed to decode the DER-encoded certificate"))]
    DecodeCertificate { source: x509_cert::der::Error },

    #[snafu(display("failed to re-encode the {component} component"))]
    EncodeComponent {
        component: &'static str,
        source: x509_cert::der::Error,
    },

    #[snafu(display("failed to decode the {extension} extension"))]
    DecodeExtension {
        extension: &'static str,
        source: x509_cert::der::Error,
    },

    #[snafu(display("certificate expired at {not_after:?}"))]
    CertificateExpired { not_after: SystemTime },

    #[snafu(display("certificate only becomes valid at {not_before:?}"))]
    CertificateNotYetValid { not_before: SystemTime },
}

/// Canonical signature algorithm tags, covering both the standard and the
/// national namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Unknown,
    Sha1WithRsa,
    Sha256WithRsa,
    Sha384WithRsa,
    Sha512WithRsa,
    EcdsaWithSha1,
    EcdsaWithSha256,
    EcdsaWithSha384,
    EcdsaWithSha512,
    Sm2WithSm3,
    Sm2WithSha1,
    Sm2WithSha256,
}

/// Canonical public key algorithm tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    Unknown,
    Rsa,
    Ecdsa,
    Sm2,
}

/// Canonical extended key usage tags, mirroring the set standard X.509
/// libraries materialize out of the extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtKeyUsage {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    IpsecEndSystem,
    IpsecTunnel,
    IpsecUser,
    TimeStamping,
    OcspSigning,
    MicrosoftServerGatedCrypto,
    NetscapeServerGatedCrypto,
    MicrosoftCommercialCodeSigning,
    MicrosoftKernelCodeSigning,
}

/// Key usage bits, in the bit order of the X.509 `KeyUsage` extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyUsages(pub u16);

impl KeyUsages {
    pub const CONTENT_COMMITMENT: Self = Self(1 << 1);
    pub const CRL_SIGN: Self = Self(1 << 6);
    pub const DATA_ENCIPHERMENT: Self = Self(1 << 3);
    pub const DECIPHER_ONLY: Self = Self(1 << 8);
    pub const DIGITAL_SIGNATURE: Self = Self(1);
    pub const ENCIPHER_ONLY: Self = Self(1 << 7);
    pub const KEY_AGREEMENT: Self = Self(1 << 4);
    pub const KEY_CERT_SIGN: Self = Self(1 << 5);
    pub const KEY_ENCIPHERMENT: Self = Self(1 << 2);

    pub fn contains(self, usages: Self) -> bool {
        self.0 & usages.0 == usages.0
    }

    pub fn insert(&mut self, usages: Self) {
        self.0 |= usages.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for KeyUsages {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A certificate serial number, stored as the big-endian INTEGER bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerialNumber(Vec<u8>);

impl SerialNumber {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The serial number as minimal lowercase hex, the form CA registries
    /// index revocation entries by. Leading zero bytes do not contribute
    /// digits and a zero serial renders as `"0"`.
    pub fn as_hex(&self) -> String {
        use std::fmt::Write;

        let mut digits = self.0.iter().skip_while(|byte| **byte == 0);
        let mut out = String::with_capacity(self.0.len() * 2);

        match digits.next() {
            None => out.push('0'),
            Some(first) => {
                let _ = write!(out, "{first:x}");
                for byte in digits {
                    let _ = write!(out, "{byte:02x}");
                }
            }
        }

        out
    }
}

impl From<Vec<u8>> for SerialNumber {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// The subject or issuer name, materialized into the attribute buckets both
/// certificate ecosystems expose.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub serial_number: String,
    pub country: Vec<String>,
    pub organization: Vec<String>,
    pub organizational_unit: Vec<String>,
    pub locality: Vec<String>,
    pub province: Vec<String>,
    pub street_address: Vec<String>,
    pub postal_code: Vec<String>,
}

/// A raw X.509 extension as it appeared on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateExtension {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    pub value: Vec<u8>,
}

/// The canonical certificate record both boundary representations encode
/// into and decode out of.
///
/// Field semantics follow what established X.509 libraries materialize:
/// `max_path_len` is `-1` when the basic constraints extension carries no
/// path length, and `max_path_len_zero` disambiguates a literal zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateRecord {
    pub raw: Vec<u8>,
    pub raw_tbs_certificate: Vec<u8>,
    pub raw_subject_public_key_info: Vec<u8>,
    pub raw_subject: Vec<u8>,
    pub raw_issuer: Vec<u8>,

    pub signature: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub public_key_algorithm: PublicKeyAlgorithm,
    pub public_key: Vec<u8>,

    pub version: u8,
    pub serial_number: SerialNumber,
    pub issuer: DistinguishedName,
    pub subject: DistinguishedName,
    pub not_before: SystemTime,
    pub not_after: SystemTime,

    pub key_usage: KeyUsages,
    pub extensions: Vec<CertificateExtension>,
    pub unhandled_critical_extensions: Vec<ObjectIdentifier>,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub unknown_ext_key_usage: Vec<ObjectIdentifier>,

    pub basic_constraints_valid: bool,
    pub is_ca: bool,
    pub max_path_len: i32,
    pub max_path_len_zero: bool,

    pub subject_key_id: Vec<u8>,
    pub authority_key_id: Vec<u8>,

    pub ocsp_servers: Vec<String>,
    pub issuing_certificate_urls: Vec<String>,

    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,

    pub permitted_dns_domains_critical: bool,
    pub permitted_dns_domains: Vec<String>,

    pub crl_distribution_points: Vec<String>,
    pub policy_identifiers: Vec<ObjectIdentifier>,
}

/// Parses exactly one PEM-encoded certificate through the national decoder
/// and converts it into the standard representation.
///
/// Inputs with no or multiple PEM blocks fail with [`Error::InvalidPem`], a
/// block that is not a certificate with [`Error::UnexpectedPemLabel`], and a
/// block whose body does not decode with [`Error::DecodeCertificate`].
#[instrument(name = "parse_certificate_from_pem", skip_all)]
pub fn parse_from_pem(input: &str) -> Result<standard::StandardCertificate> {
    Ok(national::parse_pem(input)?.to_standard())
}

pub(crate) fn ensure_validity_window(
    at: SystemTime,
    not_before: SystemTime,
    not_after: SystemTime,
) -> Result<()> {
    ensure!(at >= not_before, CertificateNotYetValidSnafu { not_before });
    ensure!(at <= not_after, CertificateExpiredSnafu { not_after });
    Ok(())
}
