use crate::error::ChainError;
use crate::miner::Difficulty;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::hash::{hex_digest, Hasher, Sha256Hash, GENESIS_PREVIOUS_HASH};

/// Fixed genesis timestamp (2023-01-01T00:00:00Z) so that every node builds
/// a byte-identical genesis block.
pub const GENESIS_TIMESTAMP: u64 = 1_672_531_200_000;
pub const GENESIS_PROOF: u64 = 100;

/// A sealed block. Fields are only set at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: u64,
    transactions: Vec<Transaction>,
    proof: u64,
    #[serde(rename = "previousHash", with = "hex_digest")]
    previous_hash: Sha256Hash,
}

impl Block {
    /// Assemble a block from already-known field values, e.g. one received from a peer.
    pub fn from_parts(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: Sha256Hash,
    ) -> Self {
        Block {
            index,
            timestamp,
            transactions,
            proof,
            previous_hash,
        }
    }

    pub fn genesis() -> Self {
        Block::from_parts(
            1,
            GENESIS_TIMESTAMP,
            Vec::new(),
            GENESIS_PROOF,
            GENESIS_PREVIOUS_HASH,
        )
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn proof(&self) -> u64 {
        self.proof
    }

    pub fn previous_hash(&self) -> &Sha256Hash {
        &self.previous_hash
    }

    pub fn hash(&self) -> Sha256Hash {
        Hasher::digest(self)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}

/// The local chain plus the pool of transactions waiting for the next block.
///
/// `Ledger` does no locking of its own; the owning service wraps it in a single
/// lock so that `new_transaction`, `seal_block` and `replace_chain` never interleave.
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    difficulty: Difficulty,
}

impl Ledger {
    /// Create a ledger holding only the genesis block.
    pub fn new(difficulty: Difficulty) -> Self {
        Ledger {
            blocks: vec![Block::genesis()],
            pending: Vec::new(),
            difficulty,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn chain(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false once constructed; present for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    /// Queue a transfer for the next block and return that block's index.
    pub fn new_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<u64, ChainError> {
        self.add_transaction(Transaction::new(sender, recipient, amount))
    }

    pub fn add_transaction(&mut self, tx: Transaction) -> Result<u64, ChainError> {
        let next_index = self.last_block()?.index() + 1;
        self.pending.push(tx);
        Ok(next_index)
    }

    /// Seal the pending pool into a new block on top of the chain.
    ///
    /// The proof is taken as given. When `previous_hash` is `None` the digest of
    /// the current last block is used.
    pub fn seal_block(
        &mut self,
        proof: u64,
        previous_hash: Option<Sha256Hash>,
    ) -> Result<Block, ChainError> {
        let last = self.last_block()?;
        let index = last.index() + 1;
        let previous_hash = previous_hash.unwrap_or_else(|| last.hash());
        // Wall clock may step back; timestamps along the chain never do.
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let timestamp = now.max(last.timestamp());

        let block = Block::from_parts(
            index,
            timestamp,
            std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        );
        self.blocks.push(block.clone());

        debug!(
            index,
            proof,
            transactions = block.transactions().len(),
            "sealed block"
        );
        Ok(block)
    }

    /// Swap the whole chain. Callers validate `chain` beforehand.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<(), ChainError> {
        if chain.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        self.blocks = chain;
        Ok(())
    }
}
