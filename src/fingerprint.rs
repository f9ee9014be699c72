//! Content fingerprints used to bucket states, merge tasks and emitted variants.

use fnv::FnvHashMap;

const SEED: u64 = 0xcbf29ce484222325;
const PRIME: u64 = 0x100000001b3;

/// Order sensitive 64-bit content hash, mixed one field at a time.
///
/// Only used to pick a bucket; equality is always decided by comparing the content itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Fingerprint(u64);

impl Default for Fingerprint {
    fn default() -> Self {
        Self(SEED)
    }
}

impl Fingerprint {
    /// The unmixed seed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one field into the hash.
    #[must_use]
    pub fn mix(self, field: u64) -> Self {
        Self((self.0 ^ field).wrapping_mul(PRIME))
    }

    /// Fold every field of `fields`, in order.
    #[must_use]
    pub fn mix_all<I>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        fields.into_iter().fold(self, Self::mix)
    }

    /// The raw 64-bit hash.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A map whose keys are bucketed by a caller supplied [`Fingerprint`] and compared structurally inside a bucket.
pub(crate) struct Buckets<K, V> {
    buckets: FnvHashMap<u64, Vec<(K, V)>>,
    len: usize,
}

impl<K: Eq, V> Default for Buckets<K, V> {
    fn default() -> Self {
        Self { buckets: FnvHashMap::default(), len: 0 }
    }
}

impl<K: Eq, V> Buckets<K, V> {
    pub(crate) fn get_mut(&mut self, fingerprint: Fingerprint, key: &K) -> Option<&mut V> {
        self.buckets.get_mut(&fingerprint.value())?
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert a key known to be absent.
    pub(crate) fn insert_new(&mut self, fingerprint: Fingerprint, key: K, value: V) {
        self.buckets.entry(fingerprint.value()).or_default().push((key, value));
        self.len += 1;
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
