//! Key persistence.
//!
//! Providers themselves are stateless. Callers which need to keep generated
//! keys around pair a provider with a [`KeyStore`]. The [`DummyKeyStore`] is
//! the null object for deployments where keys only ever live in memory, such
//! as enrollment flows that receive their key material from elsewhere.
use crate::provider::{Key, KeyNotFoundSnafu, ReadOnlyStoreSnafu, Result};

/// Stores and retrieves keys by their subject key identifier.
pub trait KeyStore {
    /// Whether [`KeyStore::store_key`] is permitted.
    fn read_only(&self) -> bool;

    /// Looks up a key by its subject key identifier.
    fn get_key(&self, ski: &[u8]) -> Result<Box<dyn Key>>;

    /// Persists a key under its subject key identifier.
    fn store_key(&self, key: Box<dyn Key>) -> Result<()>;
}

/// A key store that holds nothing and accepts nothing.
///
/// [`DummyKeyStore::get_key`] always fails with
/// [`Error::KeyNotFound`][crate::provider::Error::KeyNotFound], and
/// [`DummyKeyStore::store_key`] with
/// [`Error::ReadOnlyStore`][crate::provider::Error::ReadOnlyStore].
#[derive(Clone, Copy, Debug, Default)]
pub struct DummyKeyStore;

impl KeyStore for DummyKeyStore {
    fn read_only(&self) -> bool {
        true
    }

    fn get_key(&self, _ski: &[u8]) -> Result<Box<dyn Key>> {
        KeyNotFoundSnafu.fail()
    }

    fn store_key(&self, _key: Box<dyn Key>) -> Result<()> {
        ReadOnlyStoreSnafu.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        Error, KeyGenerator,
        national::NationalProvider,
        options::{KeyAlgorithm, KeyGenOptions},
    };

    #[test]
    fn dummy_store_is_read_only() {
        assert!(DummyKeyStore.read_only());
    }

    #[test]
    fn dummy_store_holds_no_keys() {
        let result = DummyKeyStore.get_key(&[0xab; 32]);
        assert!(matches!(result, Err(Error::KeyNotFound)));
    }

    #[test]
    fn dummy_store_rejects_writes() {
        let key = NationalProvider::new()
            .key_gen(&KeyGenOptions {
                algorithm: KeyAlgorithm::Sm2,
                ephemeral: true,
            })
            .expect("SM2 key generation must succeed");

        let result = DummyKeyStore.store_key(key);
        assert!(matches!(result, Err(Error::ReadOnlyStore)));
    }
}
