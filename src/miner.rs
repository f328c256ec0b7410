//! Proof-of-work: the difficulty predicate shared by miners and validators,
//! and a cancellable search for the next proof.

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Number of leading zero hex digits a proof digest must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    /// A SHA-256 digest has 64 hex digits.
    pub const MAX: u8 = 64;

    pub fn new(leading_zeros: u8) -> Result<Self, ChainError> {
        if leading_zeros == 0 || leading_zeros > Self::MAX {
            return Err(ChainError::ConfigError(format!(
                "difficulty must be between 1 and {}, got {}",
                Self::MAX,
                leading_zeros
            )));
        }
        Ok(Difficulty(leading_zeros))
    }

    pub fn leading_zeros(self) -> u8 {
        self.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty(4)
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = ChainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Difficulty::new(value)
    }
}

impl From<Difficulty> for u8 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.0
    }
}

/// SHA-256 of `last_proof || proof`, both as big-endian u64.
pub fn proof_digest(proof: u64, last_proof: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(last_proof.to_be_bytes());
    hasher.update(proof.to_be_bytes());
    hasher.finalize().into()
}

/// True iff the hex form of `hash` starts with `difficulty` zeros.
pub fn meets_difficulty(hash: &[u8; 32], difficulty: Difficulty) -> bool {
    (0..difficulty.leading_zeros() as usize).all(|nibble| {
        let byte = hash[nibble / 2];
        let value = if nibble % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        value == 0
    })
}

/// The difficulty predicate. Pure, so every node agrees on it.
pub fn is_valid_proof(proof: u64, last_proof: u64, difficulty: Difficulty) -> bool {
    meets_difficulty(&proof_digest(proof, last_proof), difficulty)
}

/// Flag used to abandon an in-flight proof search. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Whether both handles refer to the same flag.
    pub fn same_as(&self, other: &CancelFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Miner {
    difficulty: Difficulty,
}

impl Miner {
    pub fn new(difficulty: Difficulty) -> Self {
        Miner { difficulty }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Return the smallest proof valid against `last_proof`.
    ///
    /// Runs until a proof is found or `cancel` is set; the flag is checked
    /// before every candidate.
    pub fn mine(&self, last_proof: u64, cancel: &CancelFlag) -> Result<u64, ChainError> {
        let mut candidate: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                debug!(last_proof, attempts = candidate, "proof search cancelled");
                return Err(ChainError::CancelledMining);
            }
            if is_valid_proof(candidate, last_proof, self.difficulty) {
                return Ok(candidate);
            }
            candidate = candidate.checked_add(1).ok_or_else(|| {
                ChainError::InvalidBlock(format!("no proof exists for last proof {}", last_proof))
            })?;
        }
    }

    /// Run `mine` on the blocking thread pool so the async runtime stays responsive.
    pub async fn mine_async(&self, last_proof: u64, cancel: CancelFlag) -> Result<u64, ChainError> {
        let miner = *self;
        let started = std::time::Instant::now();
        let result = match tokio::task::spawn_blocking(move || miner.mine(last_proof, &cancel)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // The runtime is shutting down.
            Err(_) => Err(ChainError::CancelledMining),
        };

        if let Ok(proof) = &result {
            info!(
                last_proof,
                proof = *proof,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "found proof"
            );
        }
        result
    }
}
