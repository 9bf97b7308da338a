//! DER decoding into the canonical [`CertificateRecord`].
//!
//! Every extension both ecosystems handle is materialized into record
//! fields; everything else is kept raw and, if critical, listed in
//! `unhandled_critical_extensions`.
use std::net::IpAddr;

use const_oid::db::{rfc4519, rfc5280, rfc5912};
use snafu::ResultExt;
use x509_cert::{
    Certificate, Version,
    der::{
        Any, Decode, Encode, Tag, Tagged,
        asn1::{Ia5StringRef, ObjectIdentifier, PrintableStringRef, Utf8StringRef},
    },
    ext::pkix::{
        AuthorityInfoAccessSyntax, AuthorityKeyIdentifier, BasicConstraints, CertificatePolicies,
        CrlDistributionPoints, ExtendedKeyUsage, KeyUsage, KeyUsages as KeyUsageFlags,
        NameConstraints, SubjectAltName, SubjectKeyIdentifier,
        name::{DistributionPointName, GeneralName},
    },
    name::Name,
    spki::AlgorithmIdentifierOwned,
};

use crate::{
    cert::{
        CertificateExtension, CertificateRecord, DecodeExtensionSnafu, DistinguishedName,
        EncodeComponentSnafu, ExtKeyUsage, KeyUsages, PublicKeyAlgorithm, Result, SerialNumber,
        SignatureAlgorithm,
    },
    provider::options::{OID_SM2_CURVE, OID_SM2_WITH_SHA1, OID_SM2_WITH_SHA256, OID_SM2_WITH_SM3},
};

const OID_SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const OID_ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");

const SIGNATURE_ALGORITHMS: &[(ObjectIdentifier, SignatureAlgorithm)] = &[
    (OID_SM2_WITH_SM3, SignatureAlgorithm::Sm2WithSm3),
    (OID_SM2_WITH_SHA1, SignatureAlgorithm::Sm2WithSha1),
    (OID_SM2_WITH_SHA256, SignatureAlgorithm::Sm2WithSha256),
    (rfc5912::ECDSA_WITH_SHA_256, SignatureAlgorithm::EcdsaWithSha256),
    (rfc5912::ECDSA_WITH_SHA_384, SignatureAlgorithm::EcdsaWithSha384),
    (rfc5912::ECDSA_WITH_SHA_512, SignatureAlgorithm::EcdsaWithSha512),
    (OID_ECDSA_WITH_SHA1, SignatureAlgorithm::EcdsaWithSha1),
    (
        rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
        SignatureAlgorithm::Sha256WithRsa,
    ),
    (
        rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
        SignatureAlgorithm::Sha384WithRsa,
    ),
    (
        rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
        SignatureAlgorithm::Sha512WithRsa,
    ),
    (OID_SHA1_WITH_RSA, SignatureAlgorithm::Sha1WithRsa),
];

const OID_EKU_ANY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");
const OID_EKU_SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");
const OID_EKU_CLIENT_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");
const OID_EKU_CODE_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");
const OID_EKU_EMAIL_PROTECTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.4");
const OID_EKU_IPSEC_END_SYSTEM: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.5");
const OID_EKU_IPSEC_TUNNEL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.6");
const OID_EKU_IPSEC_USER: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.7");
const OID_EKU_TIME_STAMPING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.8");
const OID_EKU_OCSP_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.9");
const OID_EKU_MICROSOFT_SGC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.10.3.3");
const OID_EKU_NETSCAPE_SGC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113730.4.1");
const OID_EKU_MICROSOFT_COMMERCIAL_CODE_SIGNING: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.22");
const OID_EKU_MICROSOFT_KERNEL_CODE_SIGNING: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.61.1.1");

const EXT_KEY_USAGES: &[(ObjectIdentifier, ExtKeyUsage)] = &[
    (OID_EKU_ANY, ExtKeyUsage::Any),
    (OID_EKU_SERVER_AUTH, ExtKeyUsage::ServerAuth),
    (OID_EKU_CLIENT_AUTH, ExtKeyUsage::ClientAuth),
    (OID_EKU_CODE_SIGNING, ExtKeyUsage::CodeSigning),
    (OID_EKU_EMAIL_PROTECTION, ExtKeyUsage::EmailProtection),
    (OID_EKU_IPSEC_END_SYSTEM, ExtKeyUsage::IpsecEndSystem),
    (OID_EKU_IPSEC_TUNNEL, ExtKeyUsage::IpsecTunnel),
    (OID_EKU_IPSEC_USER, ExtKeyUsage::IpsecUser),
    (OID_EKU_TIME_STAMPING, ExtKeyUsage::TimeStamping),
    (OID_EKU_OCSP_SIGNING, ExtKeyUsage::OcspSigning),
    (OID_EKU_MICROSOFT_SGC, ExtKeyUsage::MicrosoftServerGatedCrypto),
    (OID_EKU_NETSCAPE_SGC, ExtKeyUsage::NetscapeServerGatedCrypto),
    (
        OID_EKU_MICROSOFT_COMMERCIAL_CODE_SIGNING,
        ExtKeyUsage::MicrosoftCommercialCodeSigning,
    ),
    (
        OID_EKU_MICROSOFT_KERNEL_CODE_SIGNING,
        ExtKeyUsage::MicrosoftKernelCodeSigning,
    ),
];

const KEY_USAGE_BITS: &[(KeyUsageFlags, KeyUsages)] = &[
    (KeyUsageFlags::DigitalSignature, KeyUsages::DIGITAL_SIGNATURE),
    (KeyUsageFlags::NonRepudiation, KeyUsages::CONTENT_COMMITMENT),
    (KeyUsageFlags::KeyEncipherment, KeyUsages::KEY_ENCIPHERMENT),
    (KeyUsageFlags::DataEncipherment, KeyUsages::DATA_ENCIPHERMENT),
    (KeyUsageFlags::KeyAgreement, KeyUsages::KEY_AGREEMENT),
    (KeyUsageFlags::KeyCertSign, KeyUsages::KEY_CERT_SIGN),
    (KeyUsageFlags::CRLSign, KeyUsages::CRL_SIGN),
    (KeyUsageFlags::EncipherOnly, KeyUsages::ENCIPHER_ONLY),
    (KeyUsageFlags::DecipherOnly, KeyUsages::DECIPHER_ONLY),
];

/// Decodes a parsed certificate into the canonical record.
pub(crate) fn decode(certificate: &Certificate) -> Result<CertificateRecord> {
    let tbs = &certificate.tbs_certificate;
    let spki = &tbs.subject_public_key_info;

    let mut record = CertificateRecord {
        raw: certificate.to_der().context(EncodeComponentSnafu {
            component: "certificate",
        })?,
        raw_tbs_certificate: tbs.to_der().context(EncodeComponentSnafu {
            component: "tbsCertificate",
        })?,
        raw_subject_public_key_info: spki.to_der().context(EncodeComponentSnafu {
            component: "subjectPublicKeyInfo",
        })?,
        raw_subject: tbs.subject.to_der().context(EncodeComponentSnafu {
            component: "subject",
        })?,
        raw_issuer: tbs.issuer.to_der().context(EncodeComponentSnafu {
            component: "issuer",
        })?,

        signature: certificate.signature.raw_bytes().to_vec(),
        signature_algorithm: signature_algorithm(certificate.signature_algorithm.oid),
        public_key_algorithm: public_key_algorithm(&spki.algorithm),
        public_key: spki.subject_public_key.raw_bytes().to_vec(),

        version: match tbs.version {
            Version::V1 => 1,
            Version::V2 => 2,
            Version::V3 => 3,
        },
        serial_number: SerialNumber::new(tbs.serial_number.as_bytes().to_vec()),
        issuer: distinguished_name(&tbs.issuer),
        subject: distinguished_name(&tbs.subject),
        not_before: tbs.validity.not_before.to_system_time(),
        not_after: tbs.validity.not_after.to_system_time(),

        key_usage: KeyUsages::default(),
        extensions: Vec::new(),
        unhandled_critical_extensions: Vec::new(),
        ext_key_usage: Vec::new(),
        unknown_ext_key_usage: Vec::new(),

        basic_constraints_valid: false,
        is_ca: false,
        max_path_len: -1,
        max_path_len_zero: false,

        subject_key_id: Vec::new(),
        authority_key_id: Vec::new(),

        ocsp_servers: Vec::new(),
        issuing_certificate_urls: Vec::new(),

        dns_names: Vec::new(),
        email_addresses: Vec::new(),
        ip_addresses: Vec::new(),

        permitted_dns_domains_critical: false,
        permitted_dns_domains: Vec::new(),

        crl_distribution_points: Vec::new(),
        policy_identifiers: Vec::new(),
    };

    for extension in tbs.extensions.as_deref().unwrap_or(&[]) {
        let oid = extension.extn_id;
        let value = extension.extn_value.as_bytes();

        record.extensions.push(CertificateExtension {
            oid,
            critical: extension.critical,
            value: value.to_vec(),
        });

        if oid == rfc5280::ID_CE_KEY_USAGE {
            let key_usage = KeyUsage::from_der(value)
                .context(DecodeExtensionSnafu { extension: "key usage" })?;
            for (flag, usage) in KEY_USAGE_BITS {
                if key_usage.0.contains(*flag) {
                    record.key_usage.insert(*usage);
                }
            }
        } else if oid == rfc5280::ID_CE_EXT_KEY_USAGE {
            let eku = ExtendedKeyUsage::from_der(value).context(DecodeExtensionSnafu {
                extension: "extended key usage",
            })?;
            for purpose in eku.0 {
                match EXT_KEY_USAGES.iter().find(|(known, _)| *known == purpose) {
                    Some((_, usage)) => record.ext_key_usage.push(*usage),
                    None => record.unknown_ext_key_usage.push(purpose),
                }
            }
        } else if oid == rfc5280::ID_CE_BASIC_CONSTRAINTS {
            let constraints = BasicConstraints::from_der(value).context(DecodeExtensionSnafu {
                extension: "basic constraints",
            })?;
            record.basic_constraints_valid = true;
            record.is_ca = constraints.ca;
            record.max_path_len = constraints
                .path_len_constraint
                .map_or(-1, |path_len| i32::from(path_len));
            record.max_path_len_zero = constraints.path_len_constraint == Some(0);
        } else if oid == rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER {
            let ski = SubjectKeyIdentifier::from_der(value).context(DecodeExtensionSnafu {
                extension: "subject key identifier",
            })?;
            record.subject_key_id = ski.0.as_bytes().to_vec();
        } else if oid == rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER {
            let aki = AuthorityKeyIdentifier::from_der(value).context(DecodeExtensionSnafu {
                extension: "authority key identifier",
            })?;
            record.authority_key_id = aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default();
        } else if oid == rfc5280::ID_CE_SUBJECT_ALT_NAME {
            let san = SubjectAltName::from_der(value).context(DecodeExtensionSnafu {
                extension: "subject alternative name",
            })?;
            for name in &san.0 {
                match name {
                    GeneralName::DnsName(dns) => record.dns_names.push(dns.as_str().to_owned()),
                    GeneralName::Rfc822Name(email) => {
                        record.email_addresses.push(email.as_str().to_owned());
                    }
                    GeneralName::IpAddress(octets) => {
                        if let Some(ip) = ip_from_octets(octets.as_bytes()) {
                            record.ip_addresses.push(ip);
                        }
                    }
                    _ => {}
                }
            }
        } else if oid == rfc5280::ID_CE_NAME_CONSTRAINTS {
            let constraints = NameConstraints::from_der(value).context(DecodeExtensionSnafu {
                extension: "name constraints",
            })?;
            record.permitted_dns_domains_critical = extension.critical;
            for subtree in constraints.permitted_subtrees.iter().flatten() {
                if let GeneralName::DnsName(dns) = &subtree.base {
                    record.permitted_dns_domains.push(dns.as_str().to_owned());
                }
            }
        } else if oid == rfc5280::ID_CE_CRL_DISTRIBUTION_POINTS {
            let points = CrlDistributionPoints::from_der(value).context(DecodeExtensionSnafu {
                extension: "CRL distribution points",
            })?;
            for point in points.0 {
                let Some(DistributionPointName::FullName(names)) = point.distribution_point
                else {
                    continue;
                };
                for name in names {
                    if let GeneralName::UniformResourceIdentifier(uri) = name {
                        record.crl_distribution_points.push(uri.as_str().to_owned());
                    }
                }
            }
        } else if oid == rfc5280::ID_CE_CERTIFICATE_POLICIES {
            let policies = CertificatePolicies::from_der(value).context(DecodeExtensionSnafu {
                extension: "certificate policies",
            })?;
            record.policy_identifiers.extend(
                policies
                    .0
                    .into_iter()
                    .map(|information| information.policy_identifier),
            );
        } else if oid == rfc5280::ID_PE_AUTHORITY_INFO_ACCESS {
            let access = AuthorityInfoAccessSyntax::from_der(value).context(
                DecodeExtensionSnafu {
                    extension: "authority information access",
                },
            )?;
            for description in access.0 {
                let GeneralName::UniformResourceIdentifier(uri) = description.access_location
                else {
                    continue;
                };
                if description.access_method == rfc5280::ID_AD_OCSP {
                    record.ocsp_servers.push(uri.as_str().to_owned());
                } else if description.access_method == rfc5280::ID_AD_CA_ISSUERS {
                    record.issuing_certificate_urls.push(uri.as_str().to_owned());
                }
            }
        } else if extension.critical {
            record.unhandled_critical_extensions.push(oid);
        }
    }

    Ok(record)
}

fn signature_algorithm(oid: ObjectIdentifier) -> SignatureAlgorithm {
    SIGNATURE_ALGORITHMS
        .iter()
        .find(|(known, _)| *known == oid)
        .map_or(SignatureAlgorithm::Unknown, |(_, algorithm)| *algorithm)
}

/// SM2 keys travel as `id-ecPublicKey` with the SM2 curve as parameters, so
/// the curve decides between the two elliptic families.
fn public_key_algorithm(algorithm: &AlgorithmIdentifierOwned) -> PublicKeyAlgorithm {
    if algorithm.oid == rfc5912::RSA_ENCRYPTION {
        PublicKeyAlgorithm::Rsa
    } else if algorithm.oid == rfc5912::ID_EC_PUBLIC_KEY {
        match parameters_oid(algorithm) {
            Some(curve) if curve == OID_SM2_CURVE => PublicKeyAlgorithm::Sm2,
            Some(_) => PublicKeyAlgorithm::Ecdsa,
            None => PublicKeyAlgorithm::Unknown,
        }
    } else {
        PublicKeyAlgorithm::Unknown
    }
}

fn parameters_oid(algorithm: &AlgorithmIdentifierOwned) -> Option<ObjectIdentifier> {
    let parameters = algorithm.parameters.as_ref()?;
    let der = parameters.to_der().ok()?;
    ObjectIdentifier::from_der(&der).ok()
}

fn distinguished_name(name: &Name) -> DistinguishedName {
    let mut dn = DistinguishedName::default();

    for rdn in &name.0 {
        for attribute in rdn.0.iter() {
            let Some(value) = attribute_string(&attribute.value) else {
                continue;
            };

            let oid = attribute.oid;
            if oid == rfc4519::CN {
                dn.common_name = value;
            } else if oid == rfc4519::SERIAL_NUMBER {
                dn.serial_number = value;
            } else if oid == rfc4519::C {
                dn.country.push(value);
            } else if oid == rfc4519::O {
                dn.organization.push(value);
            } else if oid == rfc4519::OU {
                dn.organizational_unit.push(value);
            } else if oid == rfc4519::L {
                dn.locality.push(value);
            } else if oid == rfc4519::ST {
                dn.province.push(value);
            } else if oid == rfc4519::STREET {
                dn.street_address.push(value);
            } else if oid == rfc4519::POSTAL_CODE {
                dn.postal_code.push(value);
            }
        }
    }

    dn
}

fn attribute_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::PrintableString => PrintableStringRef::try_from(value)
            .ok()
            .map(|s| s.as_str().to_owned()),
        Tag::Utf8String => Utf8StringRef::try_from(value)
            .ok()
            .map(|s| s.as_str().to_owned()),
        Tag::Ia5String => Ia5StringRef::try_from(value)
            .ok()
            .map(|s| s.as_str().to_owned()),
        _ => None,
    }
}

fn ip_from_octets(octets: &[u8]) -> Option<IpAddr> {
    match octets.len() {
        4 => <[u8; 4]>::try_from(octets).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(octets).ok().map(IpAddr::from),
        _ => None,
    }
}
