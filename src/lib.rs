//! TallyChain - a single-writer proof-of-work ledger with longest-valid-chain consensus
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger, block hashing and whole-chain validation
//! - [`transaction`] - Transaction records and payload validation
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work predicate and cancellable proof search
//! - [`consensus`] - Longest valid chain conflict resolution
//!
//! ## Networking
//! - [`sync`] - Peer registry
//! - [`network`] - Fetching peer chains
//! - [`node`] - The node service tying ledger, miner and peers together
//! - `api` - HTTP endpoints (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;
pub mod sync;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
