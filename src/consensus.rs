use crate::blockchain::{check_chain, validate_chain, Block, Ledger};
use crate::miner::Difficulty;
use rayon::prelude::*;
use tracing::{info, warn};

/// Longest-valid-chain conflict resolution.
///
/// Candidates are untrusted: each one is validated in full before it is compared.
/// A candidate only wins when it is strictly longer than the local chain, so two
/// nodes with equally long chains never swap back and forth.
#[derive(Debug, Clone, Copy)]
pub struct ConsensusResolver {
    difficulty: Difficulty,
}

impl ConsensusResolver {
    pub fn new(difficulty: Difficulty) -> Self {
        Self { difficulty }
    }

    pub fn validate_chain(&self, chain: &[Block]) -> bool {
        validate_chain(chain, self.difficulty)
    }

    /// Pick the longest valid candidate strictly longer than `local_len`.
    /// The first candidate of the greatest length wins ties among candidates.
    pub fn select_longest(&self, local_len: usize, candidates: Vec<Vec<Block>>) -> Option<Vec<Block>> {
        let verdicts: Vec<bool> = candidates
            .par_iter()
            .enumerate()
            .map(|(i, chain)| match check_chain(chain, self.difficulty) {
                Ok(()) => true,
                Err(e) => {
                    warn!(candidate = i, length = chain.len(), error = %e, "discarding invalid peer chain");
                    false
                }
            })
            .collect();

        let mut best: Option<Vec<Block>> = None;
        for (chain, valid) in candidates.into_iter().zip(verdicts) {
            if !valid {
                continue;
            }
            let longest_so_far = best.as_ref().map_or(local_len, Vec::len);
            if chain.len() > longest_so_far {
                best = Some(chain);
            }
        }
        best
    }

    /// Replace the local chain with the best candidate if there is one.
    /// Returns whether the chain was replaced.
    pub fn resolve(&self, local: &mut Ledger, candidates: Vec<Vec<Block>>) -> bool {
        let local_len = local.len();
        let Some(best) = self.select_longest(local_len, candidates) else {
            info!(length = local_len, "local chain is authoritative");
            return false;
        };

        let new_len = best.len();
        match local.replace_chain(best) {
            Ok(()) => {
                info!(old_length = local_len, new_length = new_len, "local chain replaced by peer chain");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to replace local chain");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::{CancelFlag, Miner};

    fn difficulty() -> Difficulty {
        Difficulty::new(2).unwrap()
    }

    fn grow(ledger: &mut Ledger, blocks: usize, tag: &str) {
        let miner = Miner::new(ledger.difficulty());
        for _ in 0..blocks {
            ledger.new_transaction(tag, "sink", 1).unwrap();
            let last_proof = ledger.last_block().unwrap().proof();
            let proof = miner.mine(last_proof, &CancelFlag::new()).unwrap();
            ledger.seal_block(proof, None).unwrap();
        }
    }

    fn chain_of(len: usize, tag: &str) -> Vec<Block> {
        let mut ledger = Ledger::new(difficulty());
        grow(&mut ledger, len - 1, tag);
        ledger.chain().to_vec()
    }

    #[test]
    fn test_no_candidates_keeps_local() {
        let mut local = Ledger::new(difficulty());
        grow(&mut local, 2, "x");
        let before = local.chain().to_vec();

        assert!(!ConsensusResolver::new(difficulty()).resolve(&mut local, Vec::new()));
        assert_eq!(local.chain(), before.as_slice());
    }

    #[test]
    fn test_equal_length_never_replaces() {
        let mut local = Ledger::new(difficulty());
        grow(&mut local, 2, "x");
        let before = local.chain().to_vec();

        let replaced = ConsensusResolver::new(difficulty()).resolve(&mut local, vec![chain_of(3, "y")]);
        assert!(!replaced);
        assert_eq!(local.chain(), before.as_slice());
    }

    #[test]
    fn test_longest_valid_candidate_wins() {
        let mut local = Ledger::new(difficulty());
        grow(&mut local, 1, "x");

        let four = chain_of(4, "a");
        let six = chain_of(6, "b");
        let five = chain_of(5, "c");

        let replaced =
            ConsensusResolver::new(difficulty()).resolve(&mut local, vec![four, six.clone(), five]);
        assert!(replaced);
        assert_eq!(local.chain(), six.as_slice());
    }

    #[test]
    fn test_invalid_longer_candidate_is_skipped_for_valid_shorter_one() {
        let mut local = Ledger::new(difficulty());

        let valid = chain_of(3, "a");
        let mut forged = chain_of(7, "b");
        forged.remove(3);

        let replaced =
            ConsensusResolver::new(difficulty()).resolve(&mut local, vec![forged, valid.clone()]);
        assert!(replaced);
        assert_eq!(local.chain(), valid.as_slice());
    }

    #[test]
    fn test_empty_candidate_is_ignored() {
        let resolver = ConsensusResolver::new(difficulty());
        assert!(!resolver.validate_chain(&[]));
        assert!(resolver.select_longest(1, vec![Vec::new()]).is_none());
    }

    #[test]
    fn test_tie_between_candidates_keeps_first() {
        let first = chain_of(3, "a");
        let second = chain_of(3, "b");
        let chosen = ConsensusResolver::new(difficulty())
            .select_longest(1, vec![first.clone(), second])
            .unwrap();
        assert_eq!(chosen, first);
    }
}
