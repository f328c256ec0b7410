//! Transaction types for TallyChain
use serde::{Deserialize, Serialize};

/// Sender recorded on the reward transaction a miner credits to itself.
pub const REWARD_SENDER: &str = "0";

/// A pending transfer. Carries no signature and is never checked against balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Reward crediting `node_id` for sealing a block.
    pub fn reward(node_id: impl Into<String>, amount: u64) -> Self {
        Transaction::new(REWARD_SENDER, node_id, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }
}

/// Loosely-typed transaction submission as it arrives from a client.
/// Every field is optional so missing ones can be reported together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<u64>,
}
