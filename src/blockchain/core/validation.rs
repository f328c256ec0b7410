use crate::error::ChainError;
use crate::miner::{is_valid_proof, Difficulty};

use super::chain::Block;

/// Check a whole chain, reporting the first problem found.
///
/// Genesis must equal `Block::genesis()` field for field. Every later
/// block must follow its predecessor by index, not go back in time, record
/// the predecessor's digest and carry a proof valid against the predecessor's proof.
pub fn check_chain(chain: &[Block], difficulty: Difficulty) -> Result<(), ChainError> {
    let genesis = chain
        .first()
        .ok_or_else(|| ChainError::InvalidPeerChain("chain is empty".to_string()))?;

    if genesis != &Block::genesis() {
        return Err(ChainError::InvalidPeerChain(format!(
            "genesis block {} does not match the fixed genesis block {}",
            genesis.hash_hex(),
            Block::genesis().hash_hex()
        )));
    }

    for pair in chain.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);

        if current.index() != previous.index() + 1 {
            return Err(ChainError::InvalidPeerChain(format!(
                "block index {} follows {}",
                current.index(),
                previous.index()
            )));
        }

        if current.timestamp() < previous.timestamp() {
            return Err(ChainError::InvalidPeerChain(format!(
                "block {} is older than its predecessor",
                current.index()
            )));
        }

        if current.previous_hash() != &previous.hash() {
            return Err(ChainError::InvalidPeerChain(format!(
                "block {} links to {}, expected {}",
                current.index(),
                hex::encode(current.previous_hash()),
                previous.hash_hex()
            )));
        }

        if !is_valid_proof(current.proof(), previous.proof(), difficulty) {
            return Err(ChainError::InvalidPeerChain(format!(
                "block {} has an invalid proof {}",
                current.index(),
                current.proof()
            )));
        }
    }

    Ok(())
}

/// `true` iff `check_chain` finds nothing wrong. Never panics on malformed input.
pub fn validate_chain(chain: &[Block], difficulty: Difficulty) -> bool {
    check_chain(chain, difficulty).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Ledger;
    use crate::miner::{CancelFlag, Miner};
    use crate::transaction::Transaction;

    type Parts = (u64, u64, Vec<Transaction>, u64, [u8; 32]);

    fn difficulty() -> Difficulty {
        Difficulty::new(2).unwrap()
    }

    fn mined_chain(blocks: usize) -> Vec<Block> {
        let miner = Miner::new(difficulty());
        let mut ledger = Ledger::new(difficulty());
        for i in 0..blocks {
            ledger
                .new_transaction("alice", "bob", i as u64 + 1)
                .unwrap();
            let last_proof = ledger.last_block().unwrap().proof();
            let proof = miner.mine(last_proof, &CancelFlag::new()).unwrap();
            ledger.seal_block(proof, None).unwrap();
        }
        ledger.chain().to_vec()
    }

    fn rebuild(block: &Block, f: impl FnOnce(&mut Parts)) -> Block {
        let mut parts = (
            block.index(),
            block.timestamp(),
            block.transactions().to_vec(),
            block.proof(),
            *block.previous_hash(),
        );
        f(&mut parts);
        Block::from_parts(parts.0, parts.1, parts.2, parts.3, parts.4)
    }

    #[test]
    fn test_empty_chain_is_invalid() {
        assert!(!validate_chain(&[], difficulty()));
    }

    #[test]
    fn test_genesis_only_is_valid() {
        assert!(validate_chain(&[Block::genesis()], difficulty()));
    }

    #[test]
    fn test_mined_chain_is_valid() {
        let chain = mined_chain(4);
        assert_eq!(chain.len(), 5);
        assert!(validate_chain(&chain, difficulty()));
    }

    #[test]
    fn test_tampering_any_non_last_block_is_detected() {
        let chain = mined_chain(4);

        for position in 0..chain.len() - 1 {
            let tamperings: Vec<Box<dyn Fn(&mut Parts)>> = vec![
                Box::new(|p| p.1 += 1),
                Box::new(|p| p.2.push(Transaction::new("mallory", "mallory", 1_000))),
                Box::new(|p| p.3 += 1),
                Box::new(|p| p.4[0] ^= 0xff),
            ];

            for tamper in &tamperings {
                let mut forged = chain.clone();
                forged[position] = rebuild(&chain[position], |p| tamper(p));
                assert!(
                    !validate_chain(&forged, difficulty()),
                    "tampering block {} went unnoticed",
                    position + 1
                );
            }
        }
    }

    #[test]
    fn test_wrong_genesis_is_rejected() {
        let mut chain = mined_chain(1);
        chain[0] = rebuild(&chain[0], |p| p.0 = 0);
        assert!(matches!(
            check_chain(&chain, difficulty()),
            Err(ChainError::InvalidPeerChain(_))
        ));
    }

    #[test]
    fn test_genesis_with_altered_contents_is_rejected() {
        let genesis = Block::genesis();
        let variants = vec![
            rebuild(&genesis, |p| p.2.push(Transaction::new("0", "mallory", 1_000_000))),
            rebuild(&genesis, |p| p.3 += 1),
            rebuild(&genesis, |p| p.1 += 1),
        ];

        for forged in variants {
            assert!(matches!(
                check_chain(&[forged], difficulty()),
                Err(ChainError::InvalidPeerChain(_))
            ));
        }
    }

    #[test]
    fn test_invalid_proof_is_rejected() {
        let mut ledger = Ledger::new(difficulty());
        let last_proof = ledger.last_block().unwrap().proof();
        let bad_proof = (0..)
            .find(|p| !is_valid_proof(*p, last_proof, difficulty()))
            .unwrap();
        ledger.seal_block(bad_proof, None).unwrap();
        assert!(!validate_chain(ledger.chain(), difficulty()));
    }

    #[test]
    fn test_low_difficulty_chain_fails_stricter_check() {
        let chain = mined_chain(3);
        let strict = Difficulty::new(8).unwrap();
        assert!(!validate_chain(&chain, strict));
    }
}
