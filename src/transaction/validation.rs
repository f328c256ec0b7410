//! Validation logic for transaction payloads separated from type definitions
use crate::error::ChainError;
use crate::transaction::types::{Transaction, TransactionPayload};

impl TransactionPayload {
    /// Decode a JSON request body. Type errors (e.g. a negative amount) surface
    /// as `InvalidTransactionPayload`.
    pub fn from_json(body: &[u8]) -> Result<Self, ChainError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Require every field and produce a `Transaction`.
    pub fn into_transaction(self) -> Result<Transaction, ChainError> {
        let mut missing = Vec::new();
        if self.sender.is_none() {
            missing.push("sender");
        }
        if self.recipient.is_none() {
            missing.push("recipient");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }

        match (self.sender, self.recipient, self.amount) {
            (Some(sender), Some(recipient), Some(amount)) => {
                if sender.is_empty() || recipient.is_empty() {
                    return Err(ChainError::InvalidTransactionPayload(
                        "sender and recipient must not be empty".to_string(),
                    ));
                }
                Ok(Transaction::new(sender, recipient, amount))
            }
            _ => Err(ChainError::InvalidTransactionPayload(format!(
                "Missing values: {}",
                missing.join(", ")
            ))),
        }
    }
}
