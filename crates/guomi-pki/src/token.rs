//! The enrollment authentication token protocol.
//!
//! A token proves possession of the private key behind an enrollment
//! certificate. The signed payload binds the HTTP method, the request URI
//! and the request body to the certificate; the token itself is the
//! base64-encoded certificate PEM and the signature, joined by a dot.
//!
//! `compatibility_mode` selects the legacy payload shape, which omits the
//! method and URI and therefore does not protect against request replay
//! across endpoints.
use base64::{Engine, prelude::BASE64_STANDARD};
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, instrument};

use crate::{
    cert::{
        self,
        standard::{PublicKeyAlgorithm, StandardCertificate},
    },
    provider::{
        self, Hasher, Key, KeyImporter, Signer, Verifier,
        options::{KeyAlgorithm, KeyImportOptions, KeyMaterial},
    },
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("token must consist of exactly two dot-separated parts"))]
    MalformedToken,

    #[snafu(display("failed to decode the base64-encoded token part"))]
    DecodeToken { source: base64::DecodeError },

    #[snafu(display("the embedded certificate is not valid UTF-8"))]
    CertificateNotUtf8 { source: std::string::FromUtf8Error },

    #[snafu(display("failed to parse the embedded certificate"))]
    ParseCertificate { source: cert::Error },

    #[snafu(display("tokens cannot be built for {algorithm:?} certificates"))]
    UnsupportedPublicKey { algorithm: PublicKeyAlgorithm },

    #[snafu(display("failed to hash the token payload"))]
    HashPayload { source: provider::Error },

    #[snafu(display("failed to sign the token payload"))]
    SignPayload { source: provider::Error },

    #[snafu(display("the provider produced an empty token signature"))]
    EmptySignature,

    #[snafu(display("failed to import the certificate public key"))]
    ImportPublicKey { source: provider::Error },

    #[snafu(display("failed to verify the token signature"))]
    VerifySignature { source: provider::Error },

    #[snafu(display("the token signature does not match the request"))]
    InvalidSignature,
}

/// Builds an authentication token for the request described by `method`,
/// `uri` and `body`, signed with `key`.
///
/// The certificate must carry an SM2 or ECDSA public key; anything else
/// fails with [`Error::UnsupportedPublicKey`] before signing.
#[instrument(name = "build_auth_token", skip(provider, cert_pem, key, body))]
pub fn build_token<P>(
    provider: &P,
    cert_pem: &str,
    key: &dyn Key,
    method: &str,
    uri: &str,
    body: &[u8],
    compatibility_mode: bool,
) -> Result<String>
where
    P: Hasher + Signer,
{
    let certificate = cert::parse_from_pem(cert_pem).context(ParseCertificateSnafu)?;
    import_algorithm(&certificate)?;

    let payload = assemble_payload(cert_pem, method, uri, body, compatibility_mode);
    let digest = provider
        .hash(payload.as_bytes(), None)
        .context(HashPayloadSnafu)?;
    let signature = provider.sign(key, &digest, None).context(SignPayloadSnafu)?;
    ensure!(!signature.is_empty(), EmptySignatureSnafu);

    debug!(
        enrollment_id = certificate.enrollment_id(),
        "built authentication token"
    );

    Ok(format!(
        "{}.{}",
        BASE64_STANDARD.encode(cert_pem.as_bytes()),
        BASE64_STANDARD.encode(&signature)
    ))
}

/// Verifies `token` against the request described by `method`, `uri` and
/// `body` and returns the embedded certificate on success.
///
/// The signature is checked with the public key taken from the certificate
/// itself; establishing trust in that certificate is the caller's concern.
#[instrument(name = "verify_auth_token", skip(provider, token, body))]
pub fn verify_token<P>(
    provider: &P,
    token: &str,
    method: &str,
    uri: &str,
    body: &[u8],
    compatibility_mode: bool,
) -> Result<StandardCertificate>
where
    P: Hasher + Verifier + KeyImporter,
{
    let parts: Vec<&str> = token.split('.').collect();
    ensure!(parts.len() == 2, MalformedTokenSnafu);

    let cert_pem = String::from_utf8(BASE64_STANDARD.decode(parts[0]).context(DecodeTokenSnafu)?)
        .context(CertificateNotUtf8Snafu)?;
    let signature = BASE64_STANDARD.decode(parts[1]).context(DecodeTokenSnafu)?;

    let certificate = cert::parse_from_pem(&cert_pem).context(ParseCertificateSnafu)?;
    let algorithm = import_algorithm(&certificate)?;

    let key = provider
        .key_import(
            KeyMaterial::SubjectPublicKeyInfoDer(&certificate.raw_subject_public_key_info),
            &KeyImportOptions {
                algorithm,
                ephemeral: true,
            },
        )
        .context(ImportPublicKeySnafu)?;

    let payload = assemble_payload(&cert_pem, method, uri, body, compatibility_mode);
    let digest = provider
        .hash(payload.as_bytes(), None)
        .context(HashPayloadSnafu)?;
    let valid = provider
        .verify(key.as_ref(), &signature, &digest, None)
        .context(VerifySignatureSnafu)?;
    ensure!(valid, InvalidSignatureSnafu);

    debug!(
        enrollment_id = certificate.enrollment_id(),
        "verified authentication token"
    );

    Ok(certificate)
}

fn import_algorithm(certificate: &StandardCertificate) -> Result<KeyAlgorithm> {
    match certificate.public_key_algorithm {
        PublicKeyAlgorithm::Sm2 => Ok(KeyAlgorithm::Sm2),
        PublicKeyAlgorithm::Ecdsa => Ok(KeyAlgorithm::EcdsaP256),
        algorithm => UnsupportedPublicKeySnafu { algorithm }.fail(),
    }
}

/// The signed payload. The current shape binds method and URI; the legacy
/// shape only covers body and certificate.
fn assemble_payload(
    cert_pem: &str,
    method: &str,
    uri: &str,
    body: &[u8],
    compatibility_mode: bool,
) -> String {
    let b64_cert = BASE64_STANDARD.encode(cert_pem.as_bytes());
    let b64_body = BASE64_STANDARD.encode(body);

    if compatibility_mode {
        format!("{b64_body}.{b64_cert}")
    } else {
        let b64_uri = BASE64_STANDARD.encode(uri.as_bytes());
        format!("{method}.{b64_uri}.{b64_body}.{b64_cert}")
    }
}
