// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// chain management, hashing and whole-chain validation.

pub mod core;
pub use core::*;
