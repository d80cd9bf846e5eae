use kaspa_hashes::Hash;

/// The four fields the core is allowed to look at. Everything else about a header is opaque —
/// the core never mutates a header and never inspects any other field (§3).
pub trait SkeletonHeader: Clone + Send + Sync + 'static {
    fn number(&self) -> u64;
    fn parent_hash(&self) -> Hash;
    fn hash(&self) -> Hash;
    /// Serialized form, as handed to the progress store.
    fn serialized(&self) -> Vec<u8>;
    /// Reconstructs a header from the bytes `serialized` produced, or `None` if corrupt.
    fn deserialize(bytes: &[u8]) -> Option<Self>
    where
        Self: Sized;
}

/// A minimal concrete header for tests and for hosts with no richer header type of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainHeader {
    pub number: u64,
    pub parent_hash: Hash,
    pub hash: Hash,
}

impl SkeletonHeader for PlainHeader {
    fn number(&self) -> u64 {
        self.number
    }

    fn parent_hash(&self) -> Hash {
        self.parent_hash
    }

    fn hash(&self) -> Hash {
        self.hash
    }

    fn serialized(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 32 + 32);
        buf.extend_from_slice(&self.number.to_be_bytes());
        buf.extend_from_slice(&self.parent_hash.as_bytes());
        buf.extend_from_slice(&self.hash.as_bytes());
        buf
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 8 + 32 + 32 {
            return None;
        }
        let number = u64::from_be_bytes(bytes[0..8].try_into().ok()?);
        let parent_hash = Hash::from_bytes(bytes[8..40].try_into().ok()?);
        let hash = Hash::from_bytes(bytes[40..72].try_into().ok()?);
        Some(Self { number, parent_hash, hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let header = PlainHeader { number: 42, parent_hash: Hash::from_bytes([1; 32]), hash: Hash::from_bytes([2; 32]) };
        let bytes = header.serialized();
        assert_eq!(PlainHeader::deserialize(&bytes), Some(header));
    }

    #[test]
    fn rejects_truncated_bytes() {
        assert_eq!(PlainHeader::deserialize(&[0u8; 10]), None);
    }
}
