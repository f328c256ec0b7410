//! The node service: one ledger, one peer registry, and the operations the
//! transport layer exposes.

use crate::blockchain::{Block, Ledger, Sha256Hash};
use crate::config::Config;
use crate::consensus::ConsensusResolver;
use crate::error::ChainError;
use crate::miner::{CancelFlag, Difficulty, Miner};
use crate::network::ChainFetcher;
use crate::sync::PeerRegistry;
use crate::transaction::{Transaction, TransactionPayload};
use futures::future::join_all;
use parking_lot::Mutex;
use rand::RngCore;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct Node {
    ledger: Arc<RwLock<Ledger>>,
    peers: PeerRegistry,
    node_id: String,
    reward: u64,
    miner: Miner,
    resolver: ConsensusResolver,
    active_searches: Mutex<Vec<CancelFlag>>,
}

impl Node {
    pub fn new(node_id: impl Into<String>, difficulty: Difficulty, reward: u64) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Ledger::new(difficulty))),
            peers: PeerRegistry::new(),
            node_id: node_id.into(),
            reward,
            miner: Miner::new(difficulty),
            resolver: ConsensusResolver::new(difficulty),
            active_searches: Mutex::new(Vec::new()),
        }
    }

    /// Build a node from configuration, generating an identifier when none is set.
    pub fn from_config(config: &Config) -> Result<Self, ChainError> {
        config.validate()?;
        let node_id = if config.miner.node_id.is_empty() {
            Self::generate_node_id()
        } else {
            config.miner.node_id.clone()
        };
        Ok(Self::new(node_id, config.difficulty()?, config.miner.reward))
    }

    /// 32 random hex characters.
    pub fn generate_node_id() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn difficulty(&self) -> Difficulty {
        self.miner.difficulty()
    }

    /// Shared handle to the ledger; every mutation goes through its write lock.
    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        self.ledger.clone()
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Queue a transfer and return the index of the block it will land in.
    pub async fn submit_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<u64, ChainError> {
        self.ledger
            .write()
            .await
            .new_transaction(sender, recipient, amount)
    }

    pub async fn submit_payload(&self, payload: TransactionPayload) -> Result<u64, ChainError> {
        let tx = payload.into_transaction()?;
        self.ledger.write().await.add_transaction(tx)
    }

    pub async fn mine_next_block(&self) -> Result<Block, ChainError> {
        self.mine_next_block_with(CancelFlag::new()).await
    }

    /// Search for the next proof without holding the ledger lock, then seal
    /// the pending pool plus a reward transaction under it.
    ///
    /// If the tip changes during the search, the proof is stale and the
    /// search restarts against the new tip. Cancelling `cancel` ends with
    /// `CancelledMining` and leaves the ledger untouched.
    pub async fn mine_next_block_with(&self, cancel: CancelFlag) -> Result<Block, ChainError> {
        let mut search = ActiveSearch::register(&self.active_searches, cancel);
        let result = self.mine_until_sealed(&search.flag).await;
        search.finish();
        result
    }

    async fn mine_until_sealed(&self, cancel: &CancelFlag) -> Result<Block, ChainError> {
        loop {
            let (last_proof, last_hash) = {
                let ledger = self.ledger.read().await;
                let last = ledger.last_block()?;
                (last.proof(), last.hash())
            };

            let proof = self.miner.mine_async(last_proof, cancel.clone()).await?;

            if let Some(block) = self.seal_on_tip(proof, last_hash, cancel).await? {
                return Ok(block);
            }
            debug!("chain tip moved during proof search, restarting");
        }
    }

    /// Seal the pool plus a reward on top of the block whose digest is
    /// `expected_tip`. Returns `None` without touching the ledger when the
    /// tip is no longer that block.
    async fn seal_on_tip(
        &self,
        proof: u64,
        expected_tip: Sha256Hash,
        cancel: &CancelFlag,
    ) -> Result<Option<Block>, ChainError> {
        let mut ledger = self.ledger.write().await;
        if cancel.is_cancelled() {
            return Err(ChainError::CancelledMining);
        }
        if ledger.last_block()?.hash() != expected_tip {
            return Ok(None);
        }

        ledger.add_transaction(Transaction::reward(self.node_id.clone(), self.reward))?;
        let block = ledger.seal_block(proof, Some(expected_tip))?;
        info!(
            index = block.index(),
            proof = block.proof(),
            transactions = block.transactions().len(),
            "new block forged"
        );
        Ok(Some(block))
    }

    /// Number of proof searches currently running.
    pub fn active_search_count(&self) -> usize {
        self.active_searches.lock().len()
    }

    /// Cancel every in-flight proof search. Returns how many were cancelled.
    pub fn cancel_mining(&self) -> usize {
        let searches = self.active_searches.lock();
        for flag in searches.iter() {
            flag.cancel();
        }
        searches.len()
    }

    /// Consistent snapshot of the chain.
    pub async fn get_chain(&self) -> Vec<Block> {
        self.ledger.read().await.chain().to_vec()
    }

    pub async fn register_peer(&self, address: &str) -> Result<bool, ChainError> {
        self.peers.register(address).await
    }

    /// Register several peers at once; an invalid address rejects the whole batch.
    pub async fn register_peers<S: AsRef<str>>(&self, addresses: &[S]) -> Result<usize, ChainError> {
        self.peers.register_all(addresses).await
    }

    /// Fetch every registered peer's chain concurrently, then validate and
    /// compare under the ledger's write lock.
    pub async fn resolve_consensus<F>(&self, fetcher: &F) -> bool
    where
        F: ChainFetcher + ?Sized,
    {
        let peers = self.peers.peers().await;
        let fetched = join_all(peers.iter().map(|peer| fetcher.fetch_chain(peer))).await;
        let candidates: Vec<Vec<Block>> = fetched.into_iter().flatten().collect();
        debug!(peers = peers.len(), candidates = candidates.len(), "resolving consensus");

        // Validation is CPU-bound; run it off the async workers while still
        // holding the write lock.
        let mut ledger = self.ledger.clone().write_owned().await;
        let resolver = self.resolver;
        match tokio::task::spawn_blocking(move || resolver.resolve(&mut ledger, candidates)).await {
            Ok(replaced) => replaced,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!(error = %e, "consensus resolution aborted");
                false
            }
        }
    }
}

/// Registration of one in-flight search in `Node::active_searches`.
///
/// Dropping it deregisters the flag. If the search did not run to
/// completion (its future was dropped) the flag is also cancelled so the
/// blocking proof search stops.
struct ActiveSearch<'a> {
    searches: &'a Mutex<Vec<CancelFlag>>,
    flag: CancelFlag,
    finished: bool,
}

impl<'a> ActiveSearch<'a> {
    fn register(searches: &'a Mutex<Vec<CancelFlag>>, flag: CancelFlag) -> Self {
        searches.lock().push(flag.clone());
        Self {
            searches,
            flag,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for ActiveSearch<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.flag.cancel();
        }
        self.searches.lock().retain(|flag| !flag.same_as(&self.flag));
    }
}
