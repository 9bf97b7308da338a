//! The standard X.509 boundary representation.
//!
//! The tag enums in this module form the namespace standard tooling speaks.
//! They carry the national tags as well, because a certificate converted
//! from the national side must keep its algorithm identity across the
//! boundary and convert back without loss.
use std::{net::IpAddr, time::SystemTime};

use x509_cert::der::asn1::ObjectIdentifier;

use crate::cert::{
    self, CertificateExtension, CertificateRecord, DistinguishedName, KeyUsages, Result,
    SerialNumber, national::NationalCertificate,
};

/// Signature algorithm tags in the standard namespace.
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

impl From<cert::SignatureAlgorithm> for SignatureAlgorithm {
    fn from(algorithm: cert::SignatureAlgorithm) -> Self {
        match algorithm {
            cert::SignatureAlgorithm::Unknown => Self::Unknown,
            cert::SignatureAlgorithm::Sha1WithRsa => Self::Sha1WithRsa,
            cert::SignatureAlgorithm::Sha256WithRsa => Self::Sha256WithRsa,
            cert::SignatureAlgorithm::Sha384WithRsa => Self::Sha384WithRsa,
            cert::SignatureAlgorithm::Sha512WithRsa => Self::Sha512WithRsa,
            cert::SignatureAlgorithm::EcdsaWithSha1 => Self::EcdsaWithSha1,
            cert::SignatureAlgorithm::EcdsaWithSha256 => Self::EcdsaWithSha256,
            cert::SignatureAlgorithm::EcdsaWithSha384 => Self::EcdsaWithSha384,
            cert::SignatureAlgorithm::EcdsaWithSha512 => Self::EcdsaWithSha512,
            cert::SignatureAlgorithm::Sm2WithSm3 => Self::Sm2WithSm3,
            cert::SignatureAlgorithm::Sm2WithSha1 => Self::Sm2WithSha1,
            cert::SignatureAlgorithm::Sm2WithSha256 => Self::Sm2WithSha256,
        }
    }
}

impl From<SignatureAlgorithm> for cert::SignatureAlgorithm {
    fn from(algorithm: SignatureAlgorithm) -> Self {
        match algorithm {
            SignatureAlgorithm::Unknown => Self::Unknown,
            SignatureAlgorithm::Sha1WithRsa => Self::Sha1WithRsa,
            SignatureAlgorithm::Sha256WithRsa => Self::Sha256WithRsa,
            SignatureAlgorithm::Sha384WithRsa => Self::Sha384WithRsa,
            SignatureAlgorithm::Sha512WithRsa => Self::Sha512WithRsa,
            SignatureAlgorithm::EcdsaWithSha1 => Self::EcdsaWithSha1,
            SignatureAlgorithm::EcdsaWithSha256 => Self::EcdsaWithSha256,
            SignatureAlgorithm::EcdsaWithSha384 => Self::EcdsaWithSha384,
            SignatureAlgorithm::EcdsaWithSha512 => Self::EcdsaWithSha512,
            SignatureAlgorithm::Sm2WithSm3 => Self::Sm2WithSm3,
            SignatureAlgorithm::Sm2WithSha1 => Self::Sm2WithSha1,
            SignatureAlgorithm::Sm2WithSha256 => Self::Sm2WithSha256,
        }
    }
}

/// Public key algorithm tags in the standard namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    Unknown,
    Rsa,
    Ecdsa,
    Sm2,
}

impl From<cert::PublicKeyAlgorithm> for PublicKeyAlgorithm {
    fn from(algorithm: cert::PublicKeyAlgorithm) -> Self {
        match algorithm {
            cert::PublicKeyAlgorithm::Unknown => Self::Unknown,
            cert::PublicKeyAlgorithm::Rsa => Self::Rsa,
            cert::PublicKeyAlgorithm::Ecdsa => Self::Ecdsa,
            cert::PublicKeyAlgorithm::Sm2 => Self::Sm2,
        }
    }
}

impl From<PublicKeyAlgorithm> for cert::PublicKeyAlgorithm {
    fn from(algorithm: PublicKeyAlgorithm) -> Self {
        match algorithm {
            PublicKeyAlgorithm::Unknown => Self::Unknown,
            PublicKeyAlgorithm::Rsa => Self::Rsa,
            PublicKeyAlgorithm::Ecdsa => Self::Ecdsa,
            PublicKeyAlgorithm::Sm2 => Self::Sm2,
        }
    }
}

/// Extended key usage tags in the standard namespace.
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

impl From<cert::ExtKeyUsage> for ExtKeyUsage {
    fn from(usage: cert::ExtKeyUsage) -> Self {
        match usage {
            cert::ExtKeyUsage::Any => Self::Any,
            cert::ExtKeyUsage::ServerAuth => Self::ServerAuth,
            cert::ExtKeyUsage::ClientAuth => Self::ClientAuth,
            cert::ExtKeyUsage::CodeSigning => Self::CodeSigning,
            cert::ExtKeyUsage::EmailProtection => Self::EmailProtection,
            cert::ExtKeyUsage::IpsecEndSystem => Self::IpsecEndSystem,
            cert::ExtKeyUsage::IpsecTunnel => Self::IpsecTunnel,
            cert::ExtKeyUsage::IpsecUser => Self::IpsecUser,
            cert::ExtKeyUsage::TimeStamping => Self::TimeStamping,
            cert::ExtKeyUsage::OcspSigning => Self::OcspSigning,
            cert::ExtKeyUsage::MicrosoftServerGatedCrypto => Self::MicrosoftServerGatedCrypto,
            cert::ExtKeyUsage::NetscapeServerGatedCrypto => Self::NetscapeServerGatedCrypto,
            cert::ExtKeyUsage::MicrosoftCommercialCodeSigning => {
                Self::MicrosoftCommercialCodeSigning
            }
            cert::ExtKeyUsage::MicrosoftKernelCodeSigning => Self::MicrosoftKernelCodeSigning,
        }
    }
}

impl From<ExtKeyUsage> for cert::ExtKeyUsage {
    fn from(usage: ExtKeyUsage) -> Self {
        match usage {
            ExtKeyUsage::Any => Self::Any,
            ExtKeyUsage::ServerAuth => Self::ServerAuth,
            ExtKeyUsage::ClientAuth => Self::ClientAuth,
            ExtKeyUsage::CodeSigning => Self::CodeSigning,
            ExtKeyUsage::EmailProtection => Self::EmailProtection,
            ExtKeyUsage::IpsecEndSystem => Self::IpsecEndSystem,
            ExtKeyUsage::IpsecTunnel => Self::IpsecTunnel,
            ExtKeyUsage::IpsecUser => Self::IpsecUser,
            ExtKeyUsage::TimeStamping => Self::TimeStamping,
            ExtKeyUsage::OcspSigning => Self::OcspSigning,
            ExtKeyUsage::MicrosoftServerGatedCrypto => Self::MicrosoftServerGatedCrypto,
            ExtKeyUsage::NetscapeServerGatedCrypto => Self::NetscapeServerGatedCrypto,
            ExtKeyUsage::MicrosoftCommercialCodeSigning => Self::MicrosoftCommercialCodeSigning,
            ExtKeyUsage::MicrosoftKernelCodeSigning => Self::MicrosoftKernelCodeSigning,
        }
    }
}

/// A certificate as the standard X.509 side of the bridge sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandardCertificate {
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

impl StandardCertificate {
    /// Converts into the national representation. This is a pure codec: no
    /// information is gained or lost, and converting back yields the
    /// identical certificate.
    pub fn to_national(self) -> NationalCertificate {
        NationalCertificate::from(CertificateRecord::from(self))
    }

    /// The enrollment identity is the subject common name. Certificates
    /// without one yield the empty string.
    pub fn enrollment_id(&self) -> &str {
        &self.subject.common_name
    }

    /// Checks that `at` falls into the certificate's validity window.
    pub fn check_validity(&self, at: SystemTime) -> Result<()> {
        cert::ensure_validity_window(at, self.not_before, self.not_after)
    }
}

impl From<CertificateRecord> for StandardCertificate {
    fn from(record: CertificateRecord) -> Self {
        Self {
            raw: record.raw,
            raw_tbs_certificate: record.raw_tbs_certificate,
            raw_subject_public_key_info: record.raw_subject_public_key_info,
            raw_subject: record.raw_subject,
            raw_issuer: record.raw_issuer,
            signature: record.signature,
            signature_algorithm: record.signature_algorithm.into(),
            public_key_algorithm: record.public_key_algorithm.into(),
            public_key: record.public_key,
            version: record.version,
            serial_number: record.serial_number,
            issuer: record.issuer,
            subject: record.subject,
            not_before: record.not_before,
            not_after: record.not_after,
            key_usage: record.key_usage,
            extensions: record.extensions,
            unhandled_critical_extensions: record.unhandled_critical_extensions,
            ext_key_usage: record.ext_key_usage.into_iter().map(Into::into).collect(),
            unknown_ext_key_usage: record.unknown_ext_key_usage,
            basic_constraints_valid: record.basic_constraints_valid,
            is_ca: record.is_ca,
            max_path_len: record.max_path_len,
            max_path_len_zero: record.max_path_len_zero,
            subject_key_id: record.subject_key_id,
            authority_key_id: record.authority_key_id,
            ocsp_servers: record.ocsp_servers,
            issuing_certificate_urls: record.issuing_certificate_urls,
            dns_names: record.dns_names,
            email_addresses: record.email_addresses,
            ip_addresses: record.ip_addresses,
            permitted_dns_domains_critical: record.permitted_dns_domains_critical,
            permitted_dns_domains: record.permitted_dns_domains,
            crl_distribution_points: record.crl_distribution_points,
            policy_identifiers: record.policy_identifiers,
        }
    }
}

impl From<StandardCertificate> for CertificateRecord {
    fn from(certificate: StandardCertificate) -> Self {
        Self {
            raw: certificate.raw,
            raw_tbs_certificate: certificate.raw_tbs_certificate,
            raw_subject_public_key_info: certificate.raw_subject_public_key_info,
            raw_subject: certificate.raw_subject,
            raw_issuer: certificate.raw_issuer,
            signature: certificate.signature,
            signature_algorithm: certificate.signature_algorithm.into(),
            public_key_algorithm: certificate.public_key_algorithm.into(),
            public_key: certificate.public_key,
            version: certificate.version,
            serial_number: certificate.serial_number,
            issuer: certificate.issuer,
            subject: certificate.subject,
            not_before: certificate.not_before,
            not_after: certificate.not_after,
            key_usage: certificate.key_usage,
            extensions: certificate.extensions,
            unhandled_critical_extensions: certificate.unhandled_critical_extensions,
            ext_key_usage: certificate
                .ext_key_usage
                .into_iter()
                .map(Into::into)
                .collect(),
            unknown_ext_key_usage: certificate.unknown_ext_key_usage,
            basic_constraints_valid: certificate.basic_constraints_valid,
            is_ca: certificate.is_ca,
            max_path_len: certificate.max_path_len,
            max_path_len_zero: certificate.max_path_len_zero,
            subject_key_id: certificate.subject_key_id,
            authority_key_id: certificate.authority_key_id,
            ocsp_servers: certificate.ocsp_servers,
            issuing_certificate_urls: certificate.issuing_certificate_urls,
            dns_names: certificate.dns_names,
            email_addresses: certificate.email_addresses,
            ip_addresses: certificate.ip_addresses,
            permitted_dns_domains_critical: certificate.permitted_dns_domains_critical,
            permitted_dns_domains: certificate.permitted_dns_domains,
            crl_distribution_points: certificate.crl_distribution_points,
            policy_identifiers: certificate.policy_identifiers,
        }
    }
}
