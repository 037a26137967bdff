//! Smart Contracts with cryptography.
pub mod ecdsa;
pub mod message_hash_utils;
