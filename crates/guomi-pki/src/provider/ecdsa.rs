//! Provider backed by the standard suite: ECDSA over NIST P-256 with SHA-2
//! hashing. Signatures are DER-encoded, matching what standard X.509
//! tooling expects.
use std::{any::Any, fmt::Debug};

use p256::pkcs8::DecodePrivateKey;
use rand_core::OsRng;
use sha2::{Digest, Sha256, Sha384};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, instrument};
use x509_cert::spki::{DecodePublicKey, EncodePublicKey};

use crate::provider::{
    EmptySignatureSnafu, ExportPublicKeySnafu, Hasher, ImportPrivateKeySnafu,
    ImportPublicKeySnafu, Key, KeyDeriver, KeyGenerator, KeyImporter, KeyUnavailableSnafu,
    MalformedSignatureSnafu, NonExportableKeySnafu, NotImplementedSnafu, Result, Signer,
    SignSnafu, UnsupportedAlgorithmSnafu, UnsupportedHashAlgorithmSnafu, Verifier,
    options::{
        HashAlgorithm, HashOptions, KeyAlgorithm, KeyDerivOptions, KeyGenOptions,
        KeyImportOptions, KeyMaterial, SignOptions,
    },
};

/// A crypto provider backed by NIST P-256 ECDSA and SHA-2.
#[derive(Clone, Copy, Debug, Default)]
pub struct EcdsaProvider;

impl EcdsaProvider {
    fn verifying_key(key: &dyn Key) -> Result<p256::ecdsa::VerifyingKey> {
        let public = if let Some(key) = key.as_any().downcast_ref::<EcdsaPublicKey>() {
            key.public
        } else if let Some(key) = key.as_any().downcast_ref::<EcdsaPrivateKey>() {
            key.secret.public_key()
        } else {
            return KeyUnavailableSnafu.fail();
        };

        Ok(p256::ecdsa::VerifyingKey::from(&public))
    }
}

impl Hasher for EcdsaProvider {
    fn default_hash(&self) -> HashAlgorithm {
        HashAlgorithm::Sha256
    }

    fn hash(&self, message: &[u8], opts: Option<&HashOptions>) -> Result<Vec<u8>> {
        let algorithm = opts.map_or(self.default_hash(), |opts| opts.algorithm);
        match algorithm {
            HashAlgorithm::Sha256 => Ok(Sha256::digest(message).to_vec()),
            HashAlgorithm::Sha384 => Ok(Sha384::digest(message).to_vec()),
            HashAlgorithm::Sm3 => UnsupportedHashAlgorithmSnafu { algorithm }.fail(),
        }
    }
}

impl Signer for EcdsaProvider {
    #[instrument(name = "ecdsa_sign", skip_all)]
    fn sign(&self, key: &dyn Key, digest: &[u8], _opts: Option<&SignOptions>) -> Result<Vec<u8>> {
        let key = key
            .as_any()
            .downcast_ref::<EcdsaPrivateKey>()
            .context(KeyUnavailableSnafu)?;

        let signing_key = p256::ecdsa::SigningKey::from(&key.secret);
        let signature: p256::ecdsa::Signature =
            signing_key.sign_prehash(digest).context(SignSnafu)?;

        let bytes = signature.to_der().as_bytes().to_vec();
        ensure!(!bytes.is_empty(), EmptySignatureSnafu);

        debug!(
            signature_length = bytes.len(),
            "signed digest with P-256 key"
        );
        Ok(bytes)
    }
}

impl Verifier for EcdsaProvider {
    fn verify(
        &self,
        key: &dyn Key,
        signature: &[u8],
        digest: &[u8],
        _opts: Option<&SignOptions>,
    ) -> Result<bool> {
        let verifying_key = Self::verifying_key(key)?;
        let signature =
            p256::ecdsa::Signature::from_der(signature).context(MalformedSignatureSnafu)?;

        Ok(verifying_key.verify_prehash(digest, &signature).is_ok())
    }
}

impl KeyGenerator for EcdsaProvider {
    #[instrument(name = "generate_ecdsa_key", skip(self))]
    fn key_gen(&self, opts: &KeyGenOptions) -> Result<Box<dyn Key>> {
        ensure!(
            opts.algorithm == KeyAlgorithm::EcdsaP256,
            UnsupportedAlgorithmSnafu {
                algorithm: opts.algorithm
            }
        );

        let secret = p256::SecretKey::random(&mut OsRng);
        Ok(Box::new(EcdsaPrivateKey { secret }))
    }
}

impl KeyImporter for EcdsaProvider {
    #[instrument(name = "import_ecdsa_key", skip(self, material))]
    fn key_import(
        &self,
        material: KeyMaterial<'_>,
        opts: &KeyImportOptions,
    ) -> Result<Box<dyn Key>> {
        ensure!(
            opts.algorithm == KeyAlgorithm::EcdsaP256,
            UnsupportedAlgorithmSnafu {
                algorithm: opts.algorithm
            }
        );

        match material {
            KeyMaterial::Pkcs8PrivateKeyDer(der) => {
                let secret = p256::SecretKey::from_pkcs8_der(der).context(ImportPrivateKeySnafu)?;
                Ok(Box::new(EcdsaPrivateKey { secret }))
            }
            KeyMaterial::Pkcs8PrivateKeyPem(pem) => {
                let secret = p256::SecretKey::from_pkcs8_pem(pem).context(ImportPrivateKeySnafu)?;
                Ok(Box::new(EcdsaPrivateKey { secret }))
            }
            KeyMaterial::SubjectPublicKeyInfoDer(der) => {
                let public =
                    p256::PublicKey::from_public_key_der(der).context(ImportPublicKeySnafu)?;
                Ok(Box::new(EcdsaPublicKey { public }))
            }
        }
    }
}

impl KeyDeriver for EcdsaProvider {
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

/// The private half of a P-256 keypair.
#[derive(Clone)]
pub struct EcdsaPrivateKey {
    secret: p256::SecretKey,
}

impl Debug for EcdsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdsaPrivateKey").finish_non_exhaustive()
    }
}

impl Key for EcdsaPrivateKey {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::EcdsaP256
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
        Ok(Box::new(EcdsaPublicKey {
            public: self.secret.public_key(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The public half of a P-256 keypair.
#[derive(Clone, Copy)]
pub struct EcdsaPublicKey {
    public: p256::PublicKey,
}

impl Debug for EcdsaPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdsaPublicKey").finish_non_exhaustive()
    }
}

impl Key for EcdsaPublicKey {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::EcdsaP256
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

/// The subject key identifier is the SHA-256 digest of the uncompressed
/// SEC1 point encoding.
fn ski_of(public: &p256::PublicKey) -> Vec<u8> {
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    let point = public.to_encoded_point(false);
    Sha256::digest(point.as_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Error;

    const P256_PRIVATE_KEY_PEM: &str = include_str!("../../testdata/p256.key");

    fn generate() -> Box<dyn Key> {
        EcdsaProvider
            .key_gen(&KeyGenOptions {
                algorithm: KeyAlgorithm::EcdsaP256,
                ephemeral: true,
            })
            .expect("P-256 key generation must succeed")
    }

    #[test]
    fn hashes_with_sha256_by_default() {
        let digest = EcdsaProvider.hash(b"abc", None).expect("hashing must succeed");

        // SHA-256("abc"), FIPS 180-2 appendix B.1.
        assert_eq!(
            digest,
            [
                0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d,
                0xae, 0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10,
                0xff, 0x61, 0xf2, 0x00, 0x15, 0xad
            ]
        );
    }

    #[test]
    fn hashes_with_sha384_on_request() {
        let digest = EcdsaProvider
            .hash(
                b"abc",
                Some(&HashOptions {
                    algorithm: HashAlgorithm::Sha384,
                }),
            )
            .expect("hashing must succeed");
        assert_eq!(digest.len(), 48);
    }

    #[test]
    fn rejects_the_national_hash() {
        let result = EcdsaProvider.hash(
            b"abc",
            Some(&HashOptions {
                algorithm: HashAlgorithm::Sm3,
            }),
        );
        assert!(matches!(
            result,
            Err(Error::UnsupportedHashAlgorithm {
                algorithm: HashAlgorithm::Sm3
            })
        ));
    }

    #[test]
    fn signs_and_verifies_der_signatures() {
        let key = generate();

        let digest = EcdsaProvider.hash(b"authentication token", None).expect("hash");
        let signature = EcdsaProvider.sign(key.as_ref(), &digest, None).expect("sign");

        // DER SEQUENCE of two INTEGERs
        assert_eq!(signature[0], 0x30);

        let valid = EcdsaProvider
            .verify(key.as_ref(), &signature, &digest, None)
            .expect("verification must not error");
        assert!(valid);

        let other = EcdsaProvider.hash(b"tampered", None).expect("hash");
        let valid = EcdsaProvider
            .verify(key.as_ref(), &signature, &other, None)
            .expect("verification must not error");
        assert!(!valid);
    }

    #[test]
    fn rejects_non_der_signatures() {
        let key = generate();
        let result = EcdsaProvider.verify(key.as_ref(), &[0xff; 64], &[0xaa; 32], None);
        assert!(matches!(result, Err(Error::MalformedSignature { .. })));
    }

    #[test]
    fn imports_pkcs8_private_keys() {
        let key = EcdsaProvider
            .key_import(
                KeyMaterial::Pkcs8PrivateKeyPem(P256_PRIVATE_KEY_PEM),
                &KeyImportOptions {
                    algorithm: KeyAlgorithm::EcdsaP256,
                    ephemeral: true,
                },
            )
            .expect("import must succeed");

        assert_eq!(key.algorithm(), KeyAlgorithm::EcdsaP256);
        assert!(key.is_private());
        assert_eq!(key.ski().len(), 32);
    }

    #[test]
    fn rejects_foreign_key_imports() {
        let result = EcdsaProvider.key_import(
            KeyMaterial::Pkcs8PrivateKeyPem(P256_PRIVATE_KEY_PEM),
            &KeyImportOptions {
                algorithm: KeyAlgorithm::Sm2,
                ephemeral: true,
            },
        );
        assert!(matches!(
            result,
            Err(Error::UnsupportedAlgorithm {
                algorithm: KeyAlgorithm::Sm2
            })
        ));
    }

    #[test]
    fn key_derivation_is_not_implemented() {
        let key = generate();
        let result = EcdsaProvider.key_derive(key.as_ref(), None);
        assert!(matches!(result, Err(Error::NotImplemented { .. })));
    }
}
