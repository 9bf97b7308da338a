//! Option objects accepted by the provider capability traits.
//!
//! All configuration enumerations live here, together with the object
//! identifiers they map to on the wire. Callers select algorithms through
//! these types instead of provider-specific constants.
use std::fmt::Display;

use const_oid::{ObjectIdentifier, db::rfc5912};

/// Curve OID for the national SM2 elliptic curve (GM/T 0006).
pub const OID_SM2_CURVE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.301");

/// Signature OID for SM2 signatures over an SM3 digest.
pub const OID_SM2_WITH_SM3: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.501");

/// Signature OID for SM2 signatures over a SHA-1 digest.
pub const OID_SM2_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.502");

/// Signature OID for SM2 signatures over a SHA-256 digest.
pub const OID_SM2_WITH_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.156.10197.1.503");

/// Digest OID for the SM3 hash function.
pub const OID_SM3: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.401");

/// Hash functions a provider can be asked to compute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// The national SM3 hash function (GM/T 0004), 256 bit digests.
    Sm3,
    Sha256,
    Sha384,
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sm3 => f.write_str("sm3"),
            Self::Sha256 => f.write_str("sha-256"),
            Self::Sha384 => f.write_str("sha-384"),
        }
    }
}

/// Key families a provider can generate or import.
///
/// The RSA selectors are accepted for interoperability with callers that
/// enumerate them, but neither shipped provider implements RSA operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// The national SM2 elliptic curve.
    Sm2,
    EcdsaP256,
    EcdsaP384,
    Rsa2048,
    Rsa3072,
    Rsa4096,
}

impl KeyAlgorithm {
    /// The curve OID carried in the `SubjectPublicKeyInfo` parameters for
    /// elliptic curve keys of this family. RSA selectors have no curve.
    pub fn curve_oid(&self) -> Option<ObjectIdentifier> {
        match self {
            Self::Sm2 => Some(OID_SM2_CURVE),
            Self::EcdsaP256 => Some(rfc5912::SECP_256_R_1),
            Self::EcdsaP384 => Some(rfc5912::SECP_384_R_1),
            Self::Rsa2048 | Self::Rsa3072 | Self::Rsa4096 => None,
        }
    }

    /// The signature algorithm OID produced when a key of this family signs
    /// with its default hash function.
    pub fn signature_oid(&self) -> ObjectIdentifier {
        match self {
            Self::Sm2 => OID_SM2_WITH_SM3,
            Self::EcdsaP256 => rfc5912::ECDSA_WITH_SHA_256,
            Self::EcdsaP384 => rfc5912::ECDSA_WITH_SHA_384,
            Self::Rsa2048 | Self::Rsa3072 => rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            Self::Rsa4096 => rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
        }
    }
}

impl Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sm2 => f.write_str("sm2"),
            Self::EcdsaP256 => f.write_str("ecdsa-p256"),
            Self::EcdsaP384 => f.write_str("ecdsa-p384"),
            Self::Rsa2048 => f.write_str("rsa-2048"),
            Self::Rsa3072 => f.write_str("rsa-3072"),
            Self::Rsa4096 => f.write_str("rsa-4096"),
        }
    }
}

/// Options for [`Hasher::hash`][crate::provider::Hasher::hash]. Passing
/// `None` selects the provider's default hash function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashOptions {
    pub algorithm: HashAlgorithm,
}

/// Options for [`Signer::sign`][crate::provider::Signer::sign] and
/// [`Verifier::verify`][crate::provider::Verifier::verify].
///
/// Both shipped providers derive everything they need from the key, so this
/// currently carries no knobs. It exists so the signatures stay stable when
/// one grows some.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignOptions {}

/// Options for [`KeyGenerator::key_gen`][crate::provider::KeyGenerator::key_gen].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyGenOptions {
    pub algorithm: KeyAlgorithm,

    /// Ephemeral keys are never handed to a [`KeyStore`][super::keystore::KeyStore]
    /// by callers which persist generated keys.
    pub ephemeral: bool,
}

/// Raw key material accepted by
/// [`KeyImporter::key_import`][crate::provider::KeyImporter::key_import].
#[derive(Clone, Copy, Debug)]
pub enum KeyMaterial<'a> {
    /// A DER-encoded PKCS#8 `PrivateKeyInfo` document.
    Pkcs8PrivateKeyDer(&'a [u8]),

    /// A PEM-encoded PKCS#8 private key (`BEGIN PRIVATE KEY`).
    Pkcs8PrivateKeyPem(&'a str),

    /// A DER-encoded X.509 `SubjectPublicKeyInfo` document.
    SubjectPublicKeyInfoDer(&'a [u8]),
}

/// Options for [`KeyImporter::key_import`][crate::provider::KeyImporter::key_import].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyImportOptions {
    /// The key family the material is expected to contain. Providers reject
    /// material of any other family.
    pub algorithm: KeyAlgorithm,
    pub ephemeral: bool,
}

/// Options for [`KeyDeriver::key_derive`][crate::provider::KeyDeriver::key_derive].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyDerivOptions {
    pub ephemeral: bool,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(KeyAlgorithm::Sm2, Some(OID_SM2_CURVE))]
    #[case(KeyAlgorithm::EcdsaP256, Some(rfc5912::SECP_256_R_1))]
    #[case(KeyAlgorithm::EcdsaP384, Some(rfc5912::SECP_384_R_1))]
    #[case(KeyAlgorithm::Rsa2048, None)]
    #[case(KeyAlgorithm::Rsa4096, None)]
    fn curve_oids(#[case] algorithm: KeyAlgorithm, #[case] expected: Option<ObjectIdentifier>) {
        assert_eq!(algorithm.curve_oid(), expected);
    }

    #[test]
    fn national_oids_match_the_wire_constants() {
        assert_eq!(OID_SM2_CURVE.to_string(), "1.2.156.10197.1.301");
        assert_eq!(OID_SM2_WITH_SM3.to_string(), "1.2.156.10197.1.501");
        assert_eq!(
            KeyAlgorithm::Sm2.signature_oid().to_string(),
            "1.2.156.10197.1.501"
        );
    }
}
