//! PKCS#10 certificate request generation for the national key family.
//!
//! Requests are assembled manually instead of through a builder: the
//! `CertificationRequestInfo` is encoded, hashed and signed through the
//! provider, then wrapped with the signature algorithm identifier. This
//! keeps the signing primitive behind the [`Signer`] seam, which standard
//! builder APIs cannot reach.
use std::{net::IpAddr, str::FromStr};

use const_oid::{AssociatedOid, db::rfc5280};
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, instrument};
use x509_cert::{
    attr::Attribute,
    der::{
        Encode, Sequence,
        asn1::{BitString, Ia5String, ObjectIdentifier, SetOfVec},
    },
    ext::{
        AsExtension, Extension,
        pkix::{SubjectAltName, name::GeneralName},
    },
    name::Name,
    request::{CertReq, CertReqInfo, ExtensionReq, Version},
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
};

use crate::provider::{
    self, Hasher, Key, Signer,
    options::{KeyAlgorithm, OID_SM2_WITH_SM3},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot request a certificate for a {algorithm} key"))]
    UnsupportedKeyAlgorithm { algorithm: KeyAlgorithm },

    #[snafu(display("failed to parse the request subject"))]
    ParseSubject { source: x509_cert::der::Error },

    #[snafu(display("failed to encode {host:?} as a subject alternative name"))]
    ParseSanValue {
        host: String,
        source: x509_cert::der::Error,
    },

    #[snafu(display("failed to encode the requested extensions"))]
    EncodeExtensions { source: x509_cert::der::Error },

    #[snafu(display("failed to obtain the public key from the signing key"))]
    ExportPublicKey { source: provider::Error },

    #[snafu(display("failed to decode the public key info"))]
    DecodePublicKey { source: x509_cert::der::Error },

    #[snafu(display("failed to encode the certification request info"))]
    EncodeRequestInfo { source: x509_cert::der::Error },

    #[snafu(display("failed to hash the certification request info"))]
    HashRequest { source: provider::Error },

    #[snafu(display("failed to sign the certification request info"))]
    SignRequest { source: provider::Error },

    #[snafu(display("the provider produced an empty request signature"))]
    EmptySignature,

    #[snafu(display("failed to encode the certification request"))]
    EncodeRequest { source: x509_cert::der::Error },
}

/// What a caller wants certified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertificateRequestTemplate {
    /// The subject as an RFC 4514 string, for example
    /// `CN=gateway,O=Example Org`.
    pub subject: String,

    /// Subject alternative names. Each entry is classified as an IP
    /// address, an email address or a DNS name, in that order.
    pub hosts: Vec<String>,

    /// Present when a CA certificate is requested.
    pub ca: Option<CaConfig>,

    /// Accepted for compatibility with existing request templates. The
    /// requested serial number never makes it into the CSR; issuers assign
    /// serials themselves.
    pub serial_number: Option<String>,
}

/// CA parameters for the requested basic constraints extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaConfig {
    pub path_length: i64,

    /// Disambiguates a literal zero path length from an absent one.
    pub path_len_zero: bool,
}

/// The basic constraints value requested through the CSR, encoded as
/// `SEQUENCE { BOOLEAN, INTEGER }` so a path length of `-1` (absent) stays
/// representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Sequence)]
struct RequestBasicConstraints {
    ca: bool,
    path_len_constraint: i64,
}

impl AssociatedOid for RequestBasicConstraints {
    const OID: ObjectIdentifier = rfc5280::ID_CE_BASIC_CONSTRAINTS;
}

impl AsExtension for RequestBasicConstraints {
    fn critical(&self, _subject: &Name, _extensions: &[Extension]) -> bool {
        true
    }
}

/// A host entry after classification.
#[derive(Clone, Debug, PartialEq, Eq)]
enum HostName {
    Ip(IpAddr),
    Email(String),
    Dns(String),
}

/// Generates a DER-encoded PKCS#10 certificate request for `key`, signed
/// through the provider.
///
/// Only the national key family can request certificates here; any other
/// key fails with [`Error::UnsupportedKeyAlgorithm`] before anything is
/// assembled.
#[instrument(name = "generate_certificate_request", skip(provider, key))]
pub fn generate<P>(
    provider: &P,
    template: &CertificateRequestTemplate,
    key: &dyn Key,
) -> Result<Vec<u8>>
where
    P: Hasher + Signer,
{
    let algorithm = key.algorithm();
    ensure!(
        algorithm == KeyAlgorithm::Sm2,
        UnsupportedKeyAlgorithmSnafu { algorithm }
    );

    let subject = Name::from_str(&template.subject).context(ParseSubjectSnafu)?;

    let mut extensions = Vec::new();

    let general_names = template
        .hosts
        .iter()
        .map(|host| general_name(host))
        .collect::<Result<Vec<_>>>()?;
    if !general_names.is_empty() {
        let san = SubjectAltName(general_names);
        extensions.push(
            san.to_extension(&subject, &extensions)
                .context(EncodeExtensionsSnafu)?,
        );
    }

    if let Some(ca) = &template.ca {
        let path_len_constraint = if ca.path_length == 0 && !ca.path_len_zero {
            -1
        } else {
            ca.path_length
        };
        let constraints = RequestBasicConstraints {
            ca: true,
            path_len_constraint,
        };
        extensions.push(
            constraints
                .to_extension(&subject, &extensions)
                .context(EncodeExtensionsSnafu)?,
        );
    }

    let mut attributes = SetOfVec::new();
    if !extensions.is_empty() {
        let attribute =
            Attribute::try_from(ExtensionReq(extensions)).context(EncodeExtensionsSnafu)?;
        attributes
            .insert(attribute)
            .context(EncodeExtensionsSnafu)?;
    }

    let spki_der = key
        .public_key()
        .context(ExportPublicKeySnafu)?
        .to_bytes()
        .context(ExportPublicKeySnafu)?;
    let public_key = {
        use x509_cert::der::Decode;
        SubjectPublicKeyInfoOwned::from_der(&spki_der).context(DecodePublicKeySnafu)?
    };

    let info = CertReqInfo {
        version: Version::V1,
        subject,
        public_key,
        attributes,
    };
    let info_der = info.to_der().context(EncodeRequestInfoSnafu)?;

    let request_digest = provider.hash(&info_der, None).context(HashRequestSnafu)?;
    let signature = provider
        .sign(key, &request_digest, None)
        .context(SignRequestSnafu)?;
    ensure!(!signature.is_empty(), EmptySignatureSnafu);

    let request = CertReq {
        info,
        algorithm: AlgorithmIdentifierOwned {
            oid: OID_SM2_WITH_SM3,
            parameters: None,
        },
        signature: BitString::from_bytes(&signature).context(EncodeRequestSnafu)?,
    };

    let der = request.to_der().context(EncodeRequestSnafu)?;
    debug!(bytes = der.len(), "generated PKCS#10 certificate request");
    Ok(der)
}

fn general_name(host: &str) -> Result<GeneralName> {
    match classify_host(host) {
        HostName::Ip(ip) => Ok(GeneralName::from(ip)),
        HostName::Email(email) => Ok(GeneralName::Rfc822Name(
            Ia5String::new(&email).context(ParseSanValueSnafu { host })?,
        )),
        HostName::Dns(dns) => Ok(GeneralName::DnsName(
            Ia5String::new(&dns).context(ParseSanValueSnafu { host })?,
        )),
    }
}

/// IP addresses win over email addresses, email addresses over DNS names.
/// Anything that is neither an IP nor an email ends up as a DNS name, even
/// when it does not look like one.
fn classify_host(host: &str) -> HostName {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return HostName::Ip(ip);
    }
    if let Some(email) = parse_email(host) {
        return HostName::Email(email);
    }
    HostName::Dns(host.to_owned())
}

/// Accepts the `local@domain` and `Display Name <local@domain>` address
/// forms and returns the bare address.
fn parse_email(host: &str) -> Option<String> {
    let candidate = host.trim();

    let address = match (candidate.find('<'), candidate.ends_with('>')) {
        (Some(start), true) => candidate.get(start + 1..candidate.len() - 1)?,
        _ => candidate,
    };

    let (local, domain) = address.split_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    if address.chars().any(char::is_whitespace) || domain.contains('@') {
        return None;
    }

    Some(address.to_owned())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use x509_cert::der::Decode;

    use super::*;
    use crate::provider::{
        KeyGenerator, Verifier,
        ecdsa::EcdsaProvider,
        national::NationalProvider,
        options::{HashOptions, KeyGenOptions, SignOptions},
    };

    const EXTENSION_REQUEST_OID: &str = "1.2.840.113549.1.9.14";

    fn national_key(provider: &NationalProvider) -> Box<dyn Key> {
        provider
            .key_gen(&KeyGenOptions {
                algorithm: KeyAlgorithm::Sm2,
                ephemeral: true,
            })
            .expect("SM2 key generation must succeed")
    }

    fn extension_request(request: &CertReq) -> ExtensionReq {
        let attribute = request
            .info
            .attributes
            .iter()
            .next()
            .expect("request must carry one attribute");
        assert_eq!(attribute.oid.to_string(), EXTENSION_REQUEST_OID);

        let value = attribute
            .values
            .iter()
            .next()
            .expect("attribute must carry one value")
            .to_der()
            .expect("attribute value must re-encode");
        ExtensionReq::from_der(&value).expect("extension request must decode")
    }

    fn requested_basic_constraints(request: &CertReq) -> (bool, RequestBasicConstraints) {
        let extensions = extension_request(request);
        let extension = extensions
            .0
            .iter()
            .find(|extension| extension.extn_id == rfc5280::ID_CE_BASIC_CONSTRAINTS)
            .expect("request must carry basic constraints")
            .clone();

        let constraints = RequestBasicConstraints::from_der(extension.extn_value.as_bytes())
            .expect("basic constraints must decode");
        (extension.critical, constraints)
    }

    #[test]
    fn generates_a_complete_ca_request() {
        let provider = NationalProvider::new();
        let key = national_key(&provider);

        let template = CertificateRequestTemplate {
            subject: "CN=intermediate.example.org,O=Example National CA".to_owned(),
            hosts: vec![
                "10.0.0.1".to_owned(),
                "a@b.com".to_owned(),
                "example.org".to_owned(),
            ],
            ca: Some(CaConfig {
                path_length: 0,
                path_len_zero: false,
            }),
            serial_number: Some("12345".to_owned()),
        };

        let der = generate(&provider, &template, key.as_ref()).expect("generation must succeed");
        let request = CertReq::from_der(&der).expect("request must decode");

        assert_eq!(request.info.version, Version::V1);
        assert_eq!(
            request.info.subject,
            Name::from_str(&template.subject).expect("subject must parse")
        );
        assert_eq!(request.algorithm.oid, OID_SM2_WITH_SM3);
        assert!(request.algorithm.parameters.is_none());

        // the requested serial number must not surface anywhere
        assert_eq!(request.info.attributes.len(), 1);

        let extensions = extension_request(&request);
        let san_extension = extensions
            .0
            .iter()
            .find(|extension| extension.extn_id == rfc5280::ID_CE_SUBJECT_ALT_NAME)
            .expect("request must carry a SAN extension");
        let san = SubjectAltName::from_der(san_extension.extn_value.as_bytes())
            .expect("SAN must decode");

        assert_eq!(san.0.len(), 3);
        assert!(matches!(&san.0[0], GeneralName::IpAddress(octets) if octets.as_bytes() == [10, 0, 0, 1]));
        assert!(matches!(&san.0[1], GeneralName::Rfc822Name(email) if email.as_str() == "a@b.com"));
        assert!(matches!(&san.0[2], GeneralName::DnsName(dns) if dns.as_str() == "example.org"));

        // path length 0 without the zero marker encodes as absent
        let (critical, constraints) = requested_basic_constraints(&request);
        assert!(critical);
        assert_eq!(
            constraints,
            RequestBasicConstraints {
                ca: true,
                path_len_constraint: -1
            }
        );

        // the embedded signature must verify over the request info
        let info_der = request.info.to_der().expect("request info must encode");
        let digest = provider.hash(&info_der, None).expect("hash");
        let valid = provider
            .verify(
                key.as_ref(),
                request.signature.raw_bytes(),
                &digest,
                Some(&SignOptions::default()),
            )
            .expect("verification must not error");
        assert!(valid);
    }

    #[rstest]
    #[case(CaConfig { path_length: 0, path_len_zero: true }, 0)]
    #[case(CaConfig { path_length: 2, path_len_zero: false }, 2)]
    fn encodes_explicit_path_lengths(#[case] ca: CaConfig, #[case] expected: i64) {
        let provider = NationalProvider::new();
        let key = national_key(&provider);

        let template = CertificateRequestTemplate {
            subject: "CN=ca.example.org".to_owned(),
            ca: Some(ca),
            ..CertificateRequestTemplate::default()
        };

        let der = generate(&provider, &template, key.as_ref()).expect("generation must succeed");
        let request = CertReq::from_der(&der).expect("request must decode");

        let (_, constraints) = requested_basic_constraints(&request);
        assert_eq!(constraints.path_len_constraint, expected);
        assert!(constraints.ca);
    }

    #[test]
    fn plain_requests_carry_no_attributes() {
        let provider = NationalProvider::new();
        let key = national_key(&provider);

        let template = CertificateRequestTemplate {
            subject: "CN=client".to_owned(),
            ..CertificateRequestTemplate::default()
        };

        let der = generate(&provider, &template, key.as_ref()).expect("generation must succeed");
        let request = CertReq::from_der(&der).expect("request must decode");
        assert_eq!(request.info.attributes.len(), 0);
    }

    #[test]
    fn rejects_foreign_key_families() {
        let provider = NationalProvider::new();
        let key = EcdsaProvider
            .key_gen(&KeyGenOptions {
                algorithm: KeyAlgorithm::EcdsaP256,
                ephemeral: true,
            })
            .expect("P-256 key generation must succeed");

        let template = CertificateRequestTemplate {
            subject: "CN=client".to_owned(),
            ..CertificateRequestTemplate::default()
        };

        let result = generate(&provider, &template, key.as_ref());
        assert!(matches!(
            result,
            Err(Error::UnsupportedKeyAlgorithm {
                algorithm: KeyAlgorithm::EcdsaP256
            })
        ));
    }

    #[test]
    fn rejects_malformed_subjects() {
        let provider = NationalProvider::new();
        let key = national_key(&provider);

        let template = CertificateRequestTemplate {
            subject: "not a distinguished name".to_owned(),
            ..CertificateRequestTemplate::default()
        };

        let result = generate(&provider, &template, key.as_ref());
        assert!(matches!(result, Err(Error::ParseSubject { .. })));
    }

    #[test]
    fn refuses_empty_signatures() {
        struct EmptySigner;

        impl Hasher for EmptySigner {
            fn default_hash(&self) -> crate::provider::options::HashAlgorithm {
                crate::provider::options::HashAlgorithm::Sm3
            }

            fn hash(
                &self,
                _message: &[u8],
                _opts: Option<&HashOptions>,
            ) -> crate::provider::Result<Vec<u8>> {
                Ok(vec![0xaa; 32])
            }
        }

        impl Signer for EmptySigner {
            fn sign(
                &self,
                _key: &dyn Key,
                _digest: &[u8],
                _opts: Option<&SignOptions>,
            ) -> crate::provider::Result<Vec<u8>> {
                Ok(Vec::new())
            }
        }

        let key = national_key(&NationalProvider::new());
        let template = CertificateRequestTemplate {
            subject: "CN=client".to_owned(),
            ..CertificateRequestTemplate::default()
        };

        let result = generate(&EmptySigner, &template, key.as_ref());
        assert!(matches!(result, Err(Error::EmptySignature)));
    }

    #[rstest]
    #[case("10.0.0.1", HostName::Ip("10.0.0.1".parse().expect("valid IP")))]
    #[case("::1", HostName::Ip("::1".parse().expect("valid IP")))]
    #[case("ops@example.org", HostName::Email("ops@example.org".to_owned()))]
    #[case("Ops Team <ops@example.org>", HostName::Email("ops@example.org".to_owned()))]
    #[case("example.org", HostName::Dns("example.org".to_owned()))]
    #[case("a@", HostName::Dns("a@".to_owned()))]
    #[case("@b.com", HostName::Dns("@b.com".to_owned()))]
    #[case("a b@c.org", HostName::Dns("a b@c.org".to_owned()))]
    fn classifies_hosts_in_order(#[case] host: &str, #[case] expected: HostName) {
        assert_eq!(classify_host(host), expected);
    }
}
