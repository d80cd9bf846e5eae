//! The ordered list of subchains (§3) and its serialized form (§6 "Persisted layout").

use kaspa_hashes::Hash;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A contiguous range of headers already persisted, plus the hash expected at one below `tail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subchain {
    #[serde(rename = "Head")]
    pub head: u64,
    #[serde(rename = "Tail")]
    pub tail: u64,
    #[serde(rename = "Next", with = "hash_hex")]
    pub next: Hash,
}

impl Subchain {
    pub fn new(head: u64, tail: u64, next: Hash) -> Self {
        Self { head, tail, next }
    }
}

/// Wire-compatible JSON form of the sync-status value (§6): `{"Subchains": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProgressBlob {
    #[serde(rename = "Subchains")]
    pub subchains: Vec<Subchain>,
}

impl ProgressBlob {
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("ProgressBlob always serializes")
    }

    /// Returns `None` on corrupt/undecodable bytes (§4.4.1 "If absent or undecodable, start
    /// fresh"; §7 `DecodeFailure` — logged by the caller, never fatal here).
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}

mod hash_hex {
    use super::*;
    use serde::{de::Error as _, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hash.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(b: u8) -> Hash {
        Hash::from_bytes([b; 32])
    }

    #[test]
    fn round_trips() {
        let blob = ProgressBlob { subchains: vec![Subchain::new(10, 3, h(7)), Subchain::new(2, 1, h(0))] };
        let encoded = blob.encode();
        let decoded = ProgressBlob::decode(&encoded).unwrap();
        assert_eq!(blob, decoded);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(ProgressBlob::decode(b"not json").is_none());
    }
}
