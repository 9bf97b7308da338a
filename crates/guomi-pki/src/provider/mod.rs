//! Crypto provider abstraction.
//!
//! Cryptographic primitives are exposed through a set of small capability
//! traits ([`Hasher`], [`Signer`], [`Verifier`], [`KeyGenerator`],
//! [`KeyImporter`], [`KeyDeriver`]) which operate on opaque [`Key`] handles.
//! Higher layers (the CSR builder, the token protocol) stay polymorphic over
//! the provider and never touch key material directly.
//!
//! Two providers ship with this crate:
//!
//! - [`national::NationalProvider`], backed by the national SM2/SM3 suite
//! - [`ecdsa::EcdsaProvider`], backed by NIST P-256 ECDSA and SHA-2
use std::{any::Any, fmt::Debug};

use snafu::Snafu;

pub mod ecdsa;
pub mod keystore;
pub mod national;
pub mod options;

use options::{
    HashAlgorithm, HashOptions, KeyAlgorithm, KeyDerivOptions, KeyGenOptions, KeyImportOptions,
    KeyMaterial, SignOptions,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("algorithm {algorithm} is not supported by this provider"))]
    UnsupportedAlgorithm { algorithm: KeyAlgorithm },

    #[snafu(display("hash algorithm {algorithm} is not supported by this provider"))]
    UnsupportedHashAlgorithm { algorithm: HashAlgorithm },

    #[snafu(display("the supplied key cannot be used by this provider"))]
    KeyUnavailable,

    #[snafu(display("the signing primitive produced an empty signature"))]
    EmptySignature,

    #[snafu(display("{operation} is not implemented by this provider"))]
    NotImplemented { operation: &'static str },

    #[snafu(display("no key with the requested subject key identifier exists"))]
    KeyNotFound,

    #[snafu(display("the key store is read-only"))]
    ReadOnlyStore,

    #[snafu(display("private keys cannot be exported"))]
    NonExportableKey,

    #[snafu(display("failed to construct the signer"))]
    CreateSigner { source: signature::Error },

    #[snafu(display("failed to construct the verifier"))]
    CreateVerifier { source: signature::Error },

    #[snafu(display("failed to sign the digest"))]
    Sign { source: signature::Error },

    #[snafu(display("failed to parse the signature"))]
    MalformedSignature { source: signature::Error },

    #[snafu(display("failed to import the private key from PKCS#8"))]
    ImportPrivateKey { source: sm2::pkcs8::Error },

    #[snafu(display("failed to import the public key from the SubjectPublicKeyInfo"))]
    ImportPublicKey { source: x509_cert::spki::Error },

    #[snafu(display("failed to encode the public key as a SubjectPublicKeyInfo"))]
    ExportPublicKey { source: x509_cert::spki::Error },
}

/// An opaque handle to a cryptographic key held by a provider.
///
/// Providers hand out boxed keys and accept them back by reference. The
/// concrete type behind the handle is provider-specific and recovered through
/// [`Key::as_any`].
pub trait Key: Debug {
    /// The key family this key belongs to.
    fn algorithm(&self) -> KeyAlgorithm;

    /// The subject key identifier, a digest of the public half.
    fn ski(&self) -> Vec<u8>;

    /// Whether this handle holds the private half of a keypair.
    fn is_private(&self) -> bool;

    /// Serializes the key. Public keys encode as a DER
    /// `SubjectPublicKeyInfo`; private keys fail with
    /// [`Error::NonExportableKey`].
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Returns the public half of this key.
    fn public_key(&self) -> Result<Box<dyn Key>>;

    fn as_any(&self) -> &dyn Any;
}

/// Computes message digests.
pub trait Hasher {
    /// The hash function selected when no options are passed.
    fn default_hash(&self) -> HashAlgorithm;

    /// Hashes `message`, using [`Hasher::default_hash`] if `opts` is `None`.
    fn hash(&self, message: &[u8], opts: Option<&HashOptions>) -> Result<Vec<u8>>;
}

/// Signs pre-computed digests.
pub trait Signer {
    /// Signs `digest` with `key`. Fails with [`Error::KeyUnavailable`] when
    /// the key does not belong to this provider, and with
    /// [`Error::EmptySignature`] when the primitive yields no bytes.
    fn sign(&self, key: &dyn Key, digest: &[u8], opts: Option<&SignOptions>) -> Result<Vec<u8>>;
}

/// Verifies signatures over pre-computed digests.
pub trait Verifier {
    /// Verifies `signature` over `digest` with `key`. A structurally valid
    /// signature that does not match yields `Ok(false)`.
    fn verify(
        &self,
        key: &dyn Key,
        signature: &[u8],
        digest: &[u8],
        opts: Option<&SignOptions>,
    ) -> Result<bool>;
}

/// Generates fresh keypairs.
pub trait KeyGenerator {
    fn key_gen(&self, opts: &KeyGenOptions) -> Result<Box<dyn Key>>;
}

/// Imports keys from serialized material.
pub trait KeyImporter {
    fn key_import(&self, material: KeyMaterial<'_>, opts: &KeyImportOptions)
    -> Result<Box<dyn Key>>;
}

/// Derives new keys from existing ones.
pub trait KeyDeriver {
    fn key_derive(&self, key: &dyn Key, opts: Option<&KeyDerivOptions>) -> Result<Box<dyn Key>>;
}

/// The full capability surface of a crypto provider.
pub trait Provider:
    Hasher + Signer + Verifier + KeyGenerator + KeyImporter + KeyDeriver
{
}

impl<P> Provider for P where
    P: Hasher + Signer + Verifier + KeyGenerator + KeyImporter + KeyDeriver
{
}
