// crates/accrue-distribution/src/keys.rs
//
// Typed collections over a byte-keyed `KvStore`.
//
// Key layout: `{prefix byte}{component}{component}...` where
//   - addresses are a big-endian u16 length followed by their UTF-8 bytes,
//   - u64 values (periods, heights) are 8 big-endian bytes,
// so byte order of encoded keys matches logical order within one address.
// Values are JSON.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use accrue_core::{AccountAddress, AccrueError, KvStore, ValidatorAddress};

/// A component of a composite store key.
pub trait KeyPart: Sized {
    /// Append this component to `out`. Fails if it cannot be encoded
    /// without losing bytes.
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<(), AccrueError>;

    /// Decode one component from the front of `bytes`, returning the rest.
    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8]), AccrueError>;
}

fn corrupt(what: &str) -> AccrueError {
    AccrueError::Serialization(format!("corrupt store key: {}", what))
}

fn encode_str(s: &str, out: &mut Vec<u8>) -> Result<(), AccrueError> {
    let bytes = s.as_bytes();
    let len = u16::try_from(bytes.len()).map_err(|_| {
        AccrueError::InvalidAmount(format!(
            "address of {} bytes exceeds the {} byte key limit",
            bytes.len(),
            u16::MAX
        ))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

/// The smallest byte string greater than every key starting with `prefix`.
fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

fn decode_str(bytes: &[u8]) -> Result<(String, &[u8]), AccrueError> {
    if bytes.len() < 2 {
        return Err(corrupt("truncated address length"));
    }
    let len = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    let rest = &bytes[2..];
    if rest.len() < len {
        return Err(corrupt("truncated address"));
    }
    let s = std::str::from_utf8(&rest[..len]).map_err(|_| corrupt("address is not UTF-8"))?;
    Ok((s.to_string(), &rest[len..]))
}

impl KeyPart for ValidatorAddress {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<(), AccrueError> {
        encode_str(self.as_str(), out)
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8]), AccrueError> {
        let (s, rest) = decode_str(bytes)?;
        Ok((ValidatorAddress::new(s), rest))
    }
}

impl KeyPart for AccountAddress {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<(), AccrueError> {
        encode_str(self.as_str(), out)
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8]), AccrueError> {
        let (s, rest) = decode_str(bytes)?;
        Ok((AccountAddress::new(s), rest))
    }
}

impl KeyPart for u64 {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<(), AccrueError> {
        out.extend_from_slice(&self.to_be_bytes());
        Ok(())
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8]), AccrueError> {
        if bytes.len() < 8 {
            return Err(corrupt("truncated u64"));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        Ok((u64::from_be_bytes(buf), &bytes[8..]))
    }
}

impl<A: KeyPart, B: KeyPart> KeyPart for (A, B) {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<(), AccrueError> {
        self.0.encode_key(out)?;
        self.1.encode_key(out)
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8]), AccrueError> {
        let (a, rest) = A::decode_key(bytes)?;
        let (b, rest) = B::decode_key(rest)?;
        Ok(((a, b), rest))
    }
}

impl<A: KeyPart, B: KeyPart, C: KeyPart> KeyPart for (A, B, C) {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<(), AccrueError> {
        self.0.encode_key(out)?;
        self.1.encode_key(out)?;
        self.2.encode_key(out)
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8]), AccrueError> {
        let (a, rest) = A::decode_key(bytes)?;
        let (b, rest) = B::decode_key(rest)?;
        let (c, rest) = C::decode_key(rest)?;
        Ok(((a, b, c), rest))
    }
}

/// A keyed collection of JSON values under one prefix byte.
pub struct Map<K, V> {
    prefix: u8,
    name: &'static str,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: KeyPart, V: Serialize + DeserializeOwned> Map<K, V> {
    pub const fn new(prefix: u8, name: &'static str) -> Self {
        Self {
            prefix,
            name,
            _marker: PhantomData,
        }
    }

    fn key<P: KeyPart>(&self, k: &P) -> Result<Vec<u8>, AccrueError> {
        let mut out = vec![self.prefix];
        k.encode_key(&mut out)?;
        Ok(out)
    }

    pub fn get<S: KvStore>(&self, store: &S, k: &K) -> Result<Option<V>, AccrueError> {
        match store.get(&self.key(k)?)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like `get`, but a missing entry is a bookkeeping error.
    pub fn load<S: KvStore>(&self, store: &S, k: &K) -> Result<V, AccrueError> {
        self.get(store, k)?.ok_or_else(|| {
            AccrueError::InternalConsistency(format!("missing {} entry", self.name))
        })
    }

    pub fn has<S: KvStore>(&self, store: &S, k: &K) -> Result<bool, AccrueError> {
        store.has(&self.key(k)?)
    }

    pub fn save<S: KvStore>(&self, store: &mut S, k: &K, v: &V) -> Result<(), AccrueError> {
        let bytes = serde_json::to_vec(v)?;
        store.set(&self.key(k)?, &bytes)
    }

    pub fn remove<S: KvStore>(&self, store: &mut S, k: &K) -> Result<(), AccrueError> {
        store.delete(&self.key(k)?)
    }

    fn decode_entries(&self, raw: Vec<(Vec<u8>, Vec<u8>)>) -> Result<Vec<(K, V)>, AccrueError> {
        let mut entries = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let (k, rest) = K::decode_key(&key[1..])?;
            if !rest.is_empty() {
                return Err(corrupt(self.name));
            }
            entries.push((k, serde_json::from_slice(&value)?));
        }
        Ok(entries)
    }

    /// Entries whose key begins with the leading component(s) `p`, in key order.
    pub fn prefix<S: KvStore, P: KeyPart>(&self, store: &S, p: &P) -> Result<Vec<(K, V)>, AccrueError> {
        self.decode_entries(store.scan_prefix(&self.key(p)?)?)
    }

    /// Entries whose leading components lie between `from` and `to`, both
    /// inclusive, in key order. Only keys inside the bounds are read.
    pub fn range<S: KvStore, P: KeyPart>(
        &self,
        store: &S,
        from: &P,
        to: &P,
    ) -> Result<Vec<(K, V)>, AccrueError> {
        let start = self.key(from)?;
        let last = self.key(to)?;
        let raw = match prefix_end(&last) {
            Some(end) => store.scan_range(&start, &end)?,
            None => store
                .scan_prefix(&[self.prefix])?
                .into_iter()
                .filter(|(k, _)| *k >= start)
                .collect(),
        };
        self.decode_entries(raw)
    }

    /// Every entry of the collection, in key order.
    pub fn all<S: KvStore>(&self, store: &S) -> Result<Vec<(K, V)>, AccrueError> {
        self.decode_entries(store.scan_prefix(&[self.prefix])?)
    }

    /// Delete every entry whose key begins with `p`. Returns how many were removed.
    pub fn clear_prefix<S: KvStore, P: KeyPart>(&self, store: &mut S, p: &P) -> Result<usize, AccrueError> {
        let prefix = self.key(p)?;
        let keys: Vec<Vec<u8>> = store.scan_prefix(&prefix)?.into_iter().map(|(k, _)| k).collect();
        for key in &keys {
            store.delete(key)?;
        }
        Ok(keys.len())
    }
}

/// A single JSON value stored under one prefix byte.
pub struct Item<V> {
    key: u8,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Serialize + DeserializeOwned> Item<V> {
    pub const fn new(key: u8) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    pub fn get<S: KvStore>(&self, store: &S) -> Result<Option<V>, AccrueError> {
        match store.get(&[self.key])? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save<S: KvStore>(&self, store: &mut S, v: &V) -> Result<(), AccrueError> {
        let bytes = serde_json::to_vec(v)?;
        store.set(&[self.key], &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_store::MemoryStore;

    const PERIODS: Map<(ValidatorAddress, u64), String> = Map::new(0x05, "period");

    #[test]
    fn test_big_endian_periods_scan_in_order() {
        let mut store = MemoryStore::new();
        let val = ValidatorAddress::from("val");
        for period in [256u64, 1, 2, 0] {
            PERIODS.save(&mut store, &(val.clone(), period), &period.to_string()).unwrap();
        }
        PERIODS
            .save(&mut store, &(ValidatorAddress::from("other"), 3), &"x".to_string())
            .unwrap();

        let periods: Vec<u64> = PERIODS
            .prefix(&store, &val)
            .unwrap()
            .into_iter()
            .map(|((_, p), _)| p)
            .collect();
        assert_eq!(periods, vec![0, 1, 2, 256]);
        assert_eq!(PERIODS.all(&store).unwrap().len(), 5);
    }

    #[test]
    fn test_address_prefix_does_not_match_longer_address() {
        let mut store = MemoryStore::new();
        PERIODS.save(&mut store, &(ValidatorAddress::from("val"), 1), &"a".to_string()).unwrap();
        PERIODS.save(&mut store, &(ValidatorAddress::from("val2"), 1), &"b".to_string()).unwrap();
        assert_eq!(PERIODS.prefix(&store, &ValidatorAddress::from("val")).unwrap().len(), 1);
        assert_eq!(PERIODS.clear_prefix(&mut store, &ValidatorAddress::from("val")).unwrap(), 1);
        assert_eq!(PERIODS.all(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let mut store = MemoryStore::new();
        let val = ValidatorAddress::from("val");
        for period in [1u64, 2, 3, 4, u64::MAX] {
            PERIODS.save(&mut store, &(val.clone(), period), &period.to_string()).unwrap();
        }
        PERIODS.save(&mut store, &(ValidatorAddress::from("vam"), 2), &"x".to_string()).unwrap();

        let periods = |from: u64, to: u64| -> Vec<u64> {
            PERIODS
                .range(&store, &(val.clone(), from), &(val.clone(), to))
                .unwrap()
                .into_iter()
                .map(|((_, p), _)| p)
                .collect()
        };
        assert_eq!(periods(2, 3), vec![2, 3]);
        assert_eq!(periods(0, u64::MAX), vec![1, 2, 3, 4, u64::MAX]);
        assert!(periods(3, 2).is_empty());
    }

    #[test]
    fn test_oversized_address_is_rejected_not_truncated() {
        let mut store = MemoryStore::new();
        let long = "v".repeat(usize::from(u16::MAX) + 1);
        let shared = ValidatorAddress::new(long.clone());
        let other = ValidatorAddress::new(format!("{}x", long));

        let err = PERIODS.save(&mut store, &(shared.clone(), 1), &"a".to_string()).unwrap_err();
        assert!(matches!(err, AccrueError::InvalidAmount(_)));
        assert!(!err.is_fatal());
        assert!(PERIODS.get(&store, &(other, 1)).is_err());
        assert!(store.is_empty());

        // the longest encodable address still round-trips
        let max = ValidatorAddress::new("v".repeat(usize::from(u16::MAX)));
        PERIODS.save(&mut store, &(max.clone(), 7), &"b".to_string()).unwrap();
        assert_eq!(PERIODS.prefix(&store, &max).unwrap(), vec![((max, 7), "b".to_string())]);
    }

    #[test]
    fn test_load_missing_is_consistency_error() {
        let store = MemoryStore::new();
        let err = PERIODS.load(&store, &(ValidatorAddress::from("v"), 0)).unwrap_err();
        assert!(err.is_fatal());
    }
}
