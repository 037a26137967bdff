//! Signature message hash utilities for producing digests to be consumed by
//! `ECDSA` recovery or signing.
//!
//! The library provides methods for generating a hash of a message that
//! conforms to the [ERC-191] personal-message format, the one produced by
//! `eth_sign`-style wallet APIs.
//!
//! [ERC-191]: https://eips.ethereum.org/EIPS/eip-191

use alloy_primitives::{keccak256, FixedBytes};

/// Prefix for ERC-191 version `0x45` (personal messages) over a 32-byte
/// payload.
pub const ETH_SIGNED_MESSAGE_PREFIX: &[u8; 28] =
    b"\x19Ethereum Signed Message:\n32";

/// Returns the keccak256 digest of an ERC-191 signed data (version `0x45`)
/// for a 32-byte `message` hash.
///
/// The digest is calculated by prefixing the message hash with
/// [`ETH_SIGNED_MESSAGE_PREFIX`] and hashing the result. It corresponds to
/// the hash signed by the [eth_sign] JSON-RPC method.
///
/// [eth_sign]: https://ethereum.org/en/developers/docs/apis/json-rpc/#eth_sign
#[must_use]
pub fn to_eth_signed_message_hash(message: &[u8; 32]) -> FixedBytes<32> {
    let mut preimage = [0u8; 60];
    preimage[..28].copy_from_slice(ETH_SIGNED_MESSAGE_PREFIX);
    preimage[28..].copy_from_slice(message);
    keccak256(preimage)
}
