//! Provider backed by the national algorithm suite: SM2 signatures
//! (GM/T 0003) over the SM2 curve and the SM3 hash function (GM/T 0004).
//!
//! The [`sm2`] and [`sm3`] crates implement the same `elliptic-curve`,
//! `signature` and `digest` trait surface as the NIST stack, so the two
//! providers in this crate stay structurally identical.
use std::{any::Any, fmt::Debug};

use rand_core::OsRng;
use signature::{Signer as _, Verifier as _};
use sm2::{
    dsa::{Signature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    pkcs8::DecodePrivateKey,
};
use sm3::{Digest, Sm3};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, instrument};
use x509_cert::spki::{DecodePublicKey, EncodePublicKey};

use crate::provider::{
    CreateSignerSnafu, CreateVerifierSnafu, EmptySignatureSnafu, ExportPublicKeySnafu, Hasher,
    ImportPrivateKeySnafu, ImportPublicKeySnafu, Key, KeyDeriver, KeyGenerator, KeyImporter,
    KeyUnavailableSnafu, MalformedSignatureSnafu, NonExportableKeySnafu, NotImplementedSnafu,
    Result, Signer, SignSnafu, UnsupportedAlgorithmSnafu, UnsupportedHashAlgorithmSnafu, Verifier,
    options::{
        HashAlgorithm, HashOptions, KeyAlgorithm, KeyDerivOptions, KeyGenOptions,
        KeyImportOptions, KeyMaterial, SignOptions,
    },
};

/// The distinguishing identifier mixed into every SM2 signature when the
/// parties did not agree on one (GM/T 0009).
pub const DEFAULT_DISTINGUISHING_ID: &str = "1234567812345678";

/// A crypto provider backed by SM2 and SM3.
#[derive(Clone, Debug)]
pub struct NationalProvider {
    /// The SM2 distinguishing identifier used for signing and verification.
    identifier: String,
}

impl Default for NationalProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl NationalProvider {
    /// Creates a provider using the [`DEFAULT_DISTINGUISHING_ID`].
    pub fn new() -> Self {
        Self {
            identifier: DEFAULT_DISTINGUISHING_ID.to_owned(),
        }
    }

    /// Creates a provider with a custom distinguishing identifier.
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    fn verifying_key(&self, key: &dyn Key) -> Result<VerifyingKey> {
        let public = if let Some(key) = key.as_any().downcast_ref::<NationalPublicKey>() {
            key.public
        } else if let Some(key) = key.as_any().downcast_ref::<NationalPrivateKey>() {
            key.secret.public_key()
        } else {
            return KeyUnavailableSnafu.fail();
        };

        VerifyingKey::new(&self.identifier, public).context(CreateVerifierSnafu)
    }
}

impl Hasher for NationalProvider {
    fn default_hash(&self) -> HashAlgorithm {
        HashAlgorithm::Sm3
    }

    fn hash(&self, message: &[u8], opts: Option<&HashOptions>) -> Result<Vec<u8>> {
        let algorithm = opts.map_or(self.default_hash(), |opts| opts.algorithm);
        ensure!(
            algorithm == HashAlgorithm::Sm3,
            UnsupportedHashAlgorithmSnafu { algorithm }
        );

        Ok(Sm3::digest(message).to_vec())
    }
}

impl Signer for NationalProvider {
    #[instrument(name = "national_sign", skip_all)]
    fn sign(&self, key: &dyn Key, digest: &[u8], _opts: Option<&SignOptions>) -> Result<Vec<u8>> {
        let key = key
            .as_any()
            .downcast_ref::<NationalPrivateKey>()
            .context(KeyUnavailableSnafu)?;

        // The SM2 primitive hashes its input internally (ZA || message under
        // SM3), so the supplied digest is signed as the message.
        let signing_key =
            SigningKey::new(&self.identifier, &key.secret).context(CreateSignerSnafu)?;
        let signature: Signature = signing_key.try_sign(digest).context(SignSnafu)?;

        let bytes = signature.to_bytes().to_vec();
        ensure!(!bytes.is_empty(), EmptySignatureSnafu);

        debug!(signature_length = bytes.len(), "signed digest with SM2 key");
        Ok(bytes)
    }
}

impl Verifier for NationalProvider {
    fn verify(
        &self,
        key: &dyn Key,
        signature: &[u8],
        digest: &[u8],
        _opts: Option<&SignOptions>,
    ) -> Result<bool> {
        let verifying_key = self.verifying_key(key)?;
        let signature = Signature::try_from(signature).context(MalformedSignatureSnafu)?;

        Ok(verifying_key.verify(digest, &signature).is_ok())
    }
}

impl KeyGenerator for NationalProvider {
    #[instrument(name = "generate_national_key", skip(self))]
    fn key_gen(&self, opts: &KeyGenOptions) -> Result<Box<dyn Key>> {
        ensure!(
            opts.algorithm == KeyAlgorithm::Sm2,
            UnsupportedAlgorithmSnafu {
                algorithm: opts.algorithm
            }
        );

        let secret = sm2::SecretKey::random(&mut OsRng);
        Ok(Box::new(NationalPrivateKey { secret }))
    }
}

impl KeyImporter for NationalProvider {
    #[instrument(name = "import_national_key", skip(self, material))]
    fn key_import(
        &self,
        material: KeyMaterial<'_>,
        opts: &KeyImportOptions,
    ) -> Result<Box<dyn Key>> {
        ensure!(
            opts.algorithm == KeyAlgorithm::Sm2,
            UnsupportedAlgorithmSnafu {
                algorithm: opts.algorithm
            }
        );

        match material {
            KeyMaterial::Pkcs8PrivateKeyDer(der) => {
                let secret = sm2::SecretKey::from_pkcs8_der(der).context(ImportPrivateKeySnafu)?;
                Ok(Box::new(NationalPrivateKey { secret }))
            }
            KeyMaterial::Pkcs8PrivateKeyPem(pem) => {
                let secret = sm2::SecretKey::from_pkcs8_pem(pem).context(ImportPrivateKeySnafu)?;
                Ok(Box::new(NationalPrivateKey { secret }))
            }
            KeyMaterial::SubjectPublicKeyInfoDer(der) => {
                let public =
                    sm2::PublicKey::from_public_key_der(der).context(ImportPublicKeySnafu)?;
                Ok(Box::new(NationalPublicKey { public }))
            }
        }
    }
}

impl KeyDeriver for NationalProvider {
    fn key_derive(
        &self,
        _key: &dyn Key,
        _opts: Option<&KeyDerivOptions>,
    ) -> Result<Box<dyn Key>> {
        NotImplementedSnafu {
            operation: "key derivation",
        }
        .fail()
    }
}

/// The private half of an SM2 keypair.
#[derive(Clone)]
pub struct NationalPrivateKey {
    secret: sm2::SecretKey,
}

impl Debug for NationalPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NationalPrivateKey").finish_non_exhaustive()
    }
}

impl Key for NationalPrivateKey {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Sm2
    }

    fn ski(&self) -> Vec<u8> {
        ski_of(&self.secret.public_key())
    }

    fn is_private(&self) -> bool {
        true
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        NonExportableKeySnafu.fail()
    }

    fn public_key(&self) -> Result<Box<dyn Key>> {
        Ok(Box::new(NationalPublicKey {
            public: self.secret.public_key(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The public half of an SM2 keypair.
#[derive(Clone, Copy)]
pub struct NationalPublicKey {
    public: sm2::PublicKey,
}

impl Debug for NationalPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NationalPublicKey").finish_non_exhaustive()
    }
}

impl Key for NationalPublicKey {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Sm2
    }

    fn ski(&self) -> Vec<u8> {
        ski_of(&self.public)
    }

    fn is_private(&self) -> bool {
        false
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self
            .public
            .to_public_key_der()
            .context(ExportPublicKeySnafu)?
            .into_vec())
    }

    fn public_key(&self) -> Result<Box<dyn Key>> {
        Ok(Box::new(*self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The subject key identifier is the SM3 digest of the uncompressed SEC1
/// point encoding.
fn ski_of(public: &sm2::PublicKey) -> Vec<u8> {
    let point = public.to_encoded_point(false);
    Sm3::digest(point.as_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        Error,
        ecdsa::EcdsaProvider,
    };

    const SM2_PRIVATE_KEY_PEM: &str = include_str!("../../testdata/sm2.key");

    fn generate(provider: &NationalProvider) -> Box<dyn Key> {
        provider
            .key_gen(&KeyGenOptions {
                algorithm: KeyAlgorithm::Sm2,
                ephemeral: true,
            })
            .expect("SM2 key generation must succeed")
    }

    #[test]
    fn hashes_with_sm3() {
        let digest = NationalProvider::new()
            .hash(b"abc", None)
            .expect("hashing must succeed");

        // SM3("abc"), GB/T 32905-2016 appendix A.
        assert_eq!(
            digest,
            [
                0x66, 0xc7, 0xf0, 0xf4, 0x62, 0xee, 0xed, 0xd9, 0xd1, 0xf2, 0xd4, 0x6b, 0xdc,
                0x10, 0xe4, 0xe2, 0x41, 0x67, 0xc4, 0x87, 0x5c, 0xf2, 0xf7, 0xa2, 0x29, 0x7d,
                0xa0, 0x2b, 0x8f, 0x4b, 0xa8, 0xe0
            ]
        );
    }

    #[test]
    fn rejects_foreign_hash_algorithms() {
        let result = NationalProvider::new().hash(
            b"abc",
            Some(&HashOptions {
                algorithm: HashAlgorithm::Sha256,
            }),
        );
        assert!(matches!(
            result,
            Err(Error::UnsupportedHashAlgorithm {
                algorithm: HashAlgorithm::Sha256
            })
        ));
    }

    #[test]
    fn generates_private_sm2_keys() {
        let provider = NationalProvider::new();
        let key = generate(&provider);

        assert_eq!(key.algorithm(), KeyAlgorithm::Sm2);
        assert!(key.is_private());
        assert_eq!(key.ski().len(), 32);
        assert!(matches!(key.to_bytes(), Err(Error::NonExportableKey)));

        let public = key.public_key().expect("public half must be available");
        assert!(!public.is_private());
        assert_eq!(public.ski(), key.ski());

        let spki = public.to_bytes().expect("public keys must export");
        assert_eq!(spki[0], 0x30);
    }

    #[test]
    fn rejects_foreign_key_generation() {
        let result = NationalProvider::new().key_gen(&KeyGenOptions {
            algorithm: KeyAlgorithm::EcdsaP256,
            ephemeral: true,
        });
        assert!(matches!(
            result,
            Err(Error::UnsupportedAlgorithm {
                algorithm: KeyAlgorithm::EcdsaP256
            })
        ));
    }

    #[test]
    fn signs_and_verifies() {
        let provider = NationalProvider::new();
        let key = generate(&provider);

        let digest = provider.hash(b"enrollment request", None).expect("hash");
        let signature = provider.sign(key.as_ref(), &digest, None).expect("sign");
        assert_eq!(signature.len(), 64);

        let valid = provider
            .verify(key.as_ref(), &signature, &digest, None)
            .expect("verification must not error");
        assert!(valid);

        let other = provider.hash(b"another message", None).expect("hash");
        let valid = provider
            .verify(key.as_ref(), &signature, &other, None)
            .expect("verification must not error");
        assert!(!valid);
    }

    #[test]
    fn verification_uses_the_public_half() {
        let provider = NationalProvider::new();
        let key = generate(&provider);
        let public = key.public_key().expect("public half");

        let digest = provider.hash(b"payload", None).expect("hash");
        let signature = provider.sign(key.as_ref(), &digest, None).expect("sign");

        let valid = provider
            .verify(public.as_ref(), &signature, &digest, None)
            .expect("verification must not error");
        assert!(valid);
    }

    #[test]
    fn rejects_truncated_signatures() {
        let provider = NationalProvider::new();
        let key = generate(&provider);

        let result = provider.verify(key.as_ref(), &[0x01, 0x02], b"digest", None);
        assert!(matches!(result, Err(Error::MalformedSignature { .. })));
    }

    #[test]
    fn rejects_foreign_keys_for_signing() {
        let national = NationalProvider::new();
        let foreign = EcdsaProvider
            .key_gen(&KeyGenOptions {
                algorithm: KeyAlgorithm::EcdsaP256,
                ephemeral: true,
            })
            .expect("P-256 key generation must succeed");

        let result = national.sign(foreign.as_ref(), b"digest", None);
        assert!(matches!(result, Err(Error::KeyUnavailable)));
    }

    #[test]
    fn imports_pkcs8_private_keys() {
        let provider = NationalProvider::new();
        let key = provider
            .key_import(
                KeyMaterial::Pkcs8PrivateKeyPem(SM2_PRIVATE_KEY_PEM),
                &KeyImportOptions {
                    algorithm: KeyAlgorithm::Sm2,
                    ephemeral: true,
                },
            )
            .expect("import must succeed");

        assert_eq!(key.algorithm(), KeyAlgorithm::Sm2);
        assert!(key.is_private());

        let digest = provider.hash(b"imported key", None).expect("hash");
        let signature = provider.sign(key.as_ref(), &digest, None).expect("sign");
        let valid = provider
            .verify(key.as_ref(), &signature, &digest, None)
            .expect("verification must not error");
        assert!(valid);
    }

    #[test]
    fn imports_public_keys_from_spki() {
        let provider = NationalProvider::new();
        let key = generate(&provider);
        let spki = key
            .public_key()
            .expect("public half")
            .to_bytes()
            .expect("public keys must export");

        let imported = provider
            .key_import(
                KeyMaterial::SubjectPublicKeyInfoDer(&spki),
                &KeyImportOptions {
                    algorithm: KeyAlgorithm::Sm2,
                    ephemeral: true,
                },
            )
            .expect("import must succeed");

        assert!(!imported.is_private());
        assert_eq!(imported.ski(), key.ski());
    }

    #[test]
    fn key_derivation_is_not_implemented() {
        let provider = NationalProvider::new();
        let key = generate(&provider);

        let result = provider.key_derive(key.as_ref(), None);
        assert!(matches!(result, Err(Error::NotImplemented { .. })));
    }
}
