//! Block digest computation.
//!
//! The digest is the trust anchor of the ledger: every block records the digest
//! of its predecessor, so changing any field of an earlier block breaks the
//! linkage of every block after it.

use sha2::{Digest, Sha256};

use super::chain::Block;

pub type Sha256Hash = [u8; 32];

/// Previous-hash recorded by the genesis block.
pub const GENESIS_PREVIOUS_HASH: Sha256Hash = [0u8; 32];

pub struct Hasher;

impl Hasher {
    /// SHA-256 over the block fields in a fixed order:
    /// index, timestamp, transaction count, each transaction
    /// (sender, recipient, amount), proof, previous hash.
    ///
    /// Integers are little-endian. Strings are prefixed with their byte length
    /// so that adjacent fields cannot run into each other.
    pub fn digest(block: &Block) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(block.index().to_le_bytes());
        hasher.update(block.timestamp().to_le_bytes());
        hasher.update((block.transactions().len() as u64).to_le_bytes());
        for tx in block.transactions() {
            update_str(&mut hasher, &tx.sender);
            update_str(&mut hasher, &tx.recipient);
            hasher.update(tx.amount.to_le_bytes());
        }
        hasher.update(block.proof().to_le_bytes());
        hasher.update(block.previous_hash());
        hasher.finalize().into()
    }
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Serde adapter writing a digest as lowercase hex.
pub mod hex_digest {
    use super::Sha256Hash;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(hash: &Sha256Hash, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Sha256Hash, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let mut hash = [0u8; 32];
        hex::decode_to_slice(&encoded, &mut hash).map_err(serde::de::Error::custom)?;
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    fn sample_block() -> Block {
        Block::from_parts(
            2,
            1_700_000_000_000,
            vec![
                Transaction::new("alice", "bob", 10),
                Transaction::new("bob", "carol", 5),
            ],
            35_293,
            [7u8; 32],
        )
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = sample_block();
        let b = sample_block();
        assert_eq!(Hasher::digest(&a), Hasher::digest(&b));
        assert_eq!(Hasher::digest(&a), Hasher::digest(&a.clone()));
    }

    #[test]
    fn test_every_field_changes_digest() {
        let base = sample_block();
        let original = Hasher::digest(&base);

        let variants = vec![
            Block::from_parts(3, base.timestamp(), base.transactions().to_vec(), base.proof(), *base.previous_hash()),
            Block::from_parts(base.index(), base.timestamp() + 1, base.transactions().to_vec(), base.proof(), *base.previous_hash()),
            Block::from_parts(base.index(), base.timestamp(), vec![Transaction::new("alice", "bob", 11)], base.proof(), *base.previous_hash()),
            Block::from_parts(base.index(), base.timestamp(), base.transactions().to_vec(), base.proof() + 1, *base.previous_hash()),
            Block::from_parts(base.index(), base.timestamp(), base.transactions().to_vec(), base.proof(), [8u8; 32]),
        ];

        for variant in variants {
            assert_ne!(Hasher::digest(&variant), original);
        }
    }

    #[test]
    fn test_string_boundaries_are_unambiguous() {
        let a = Block::from_parts(2, 0, vec![Transaction::new("ab", "c", 1)], 0, [0u8; 32]);
        let b = Block::from_parts(2, 0, vec![Transaction::new("a", "bc", 1)], 0, [0u8; 32]);
        assert_ne!(Hasher::digest(&a), Hasher::digest(&b));
    }

    #[test]
    fn test_transaction_order_matters() {
        let a = Block::from_parts(
            2,
            0,
            vec![Transaction::new("a", "b", 1), Transaction::new("c", "d", 2)],
            0,
            [0u8; 32],
        );
        let b = Block::from_parts(
            2,
            0,
            vec![Transaction::new("c", "d", 2), Transaction::new("a", "b", 1)],
            0,
            [0u8; 32],
        );
        assert_ne!(Hasher::digest(&a), Hasher::digest(&b));
    }
}
