//! Elliptic Curve Digital Signature Algorithm (ECDSA) operations.
//!
//! These functions can be used to verify that a message was signed
//! by the holder of the private keys of a given address.
use alloc::vec::Vec;

use alloy_primitives::{address, uint, Address, B256, U256};
use alloy_sol_types::{sol, SolType};
use stylus_sdk::{
    call::{self, Call, MethodError},
    storage::TopLevelStorage,
    stylus_proc::SolidityError,
};

/// Address of the `ecRecover` EVM precompile.
pub const ECRECOVER_ADDR: Address =
    address!("0000000000000000000000000000000000000001");

/// Upper range for `s` value from the signature.
pub const SIGNATURE_S_UPPER_BOUND: U256 = uint!(
    0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256
);

sol! {
    /// The signature derives the [`Address::ZERO`].
    #[derive(Debug)]
    #[allow(missing_docs)]
    error ECDSAInvalidSignature();

    /// The signature has an `S` value that is in the upper half order.
    ///
    /// * `s` - Invalid `S` value.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error ECDSAInvalidSignatureS(bytes32 s);
}

sol! {
    /// Struct with callable data to the `ecRecover` precompile.
    #[allow(missing_docs)]
    struct EcRecoverData {
        /// ERC-191 Hash of the message.
        bytes32 hash;
        /// `v` value from the signature.
        uint8 v;
        /// `r` value from the signature.
        bytes32 r;
        /// `s` value from the signature.
        bytes32 s;
    }
}

/// An error that occurred in the implementation of an `ECDSA` library.
#[derive(SolidityError, Debug)]
pub enum Error {
    /// The signature derives the [`Address::ZERO`].
    InvalidSignature(ECDSAInvalidSignature),
    /// The signature has an `S` value that is in the upper half order.
    InvalidSignatureS(ECDSAInvalidSignatureS),
}

impl MethodError for Error {
    fn encode(self) -> alloc::vec::Vec<u8> {
        self.into()
    }
}

/// Returns the address that signed a hashed message (`hash`).
///
/// # Arguments
///
/// * `storage` - Write access to the contract's state.
/// * `hash` - Hash of the message.
/// * `v` - `v` value from the signature.
/// * `r` - `r` value from the signature.
/// * `s` - `s` value from the signature.
///
/// # Errors
///
/// If the `s` value is greater than [`SIGNATURE_S_UPPER_BOUND`], then the
/// error [`Error::InvalidSignatureS`] is returned.
/// If the recovered address is [`Address::ZERO`], then the error
/// [`Error::InvalidSignature`] is returned.
///
/// # Panics
///
/// If the `ecRecover` precompile fails to execute.
pub fn recover(
    storage: &mut impl TopLevelStorage,
    hash: B256,
    v: u8,
    r: B256,
    s: B256,
) -> Result<Address, Error> {
    check_if_malleable(&s)?;
    // If the signature is valid (and not malleable), return the signer
    // address.
    _recover(storage, hash, v, r, s)
}

/// Calls the `ecRecover` EVM precompile.
///
/// The `ecRecover` EVM precompile allows for malleable (non-unique)
/// signatures: this function rejects them by requiring the `s` value to be in
/// the lower half order, and the `v` value to be either 27 or 28.
///
/// # Errors
///
/// If the recovered address is [`Address::ZERO`], then the error
/// [`Error::InvalidSignature`] is returned.
///
/// # Panics
///
/// If the `ecRecover` precompile fails to execute.
fn _recover(
    storage: &mut impl TopLevelStorage,
    hash: B256,
    v: u8,
    r: B256,
    s: B256,
) -> Result<Address, Error> {
    if v == 0 || v == 1 {
        // `ecRecover` silently returns garbage for these values. Wallets sign
        // with `v` of 27 or 28.
        return Err(ECDSAInvalidSignature {}.into());
    }

    let calldata = encode_calldata(hash, v, r, s);

    let recovered =
        call::static_call(Call::new_in(storage), ECRECOVER_ADDR, &calldata)
            .expect("should call `ecRecover` precompile");

    let recovered = Address::from_slice(&recovered[12..]);

    if recovered.is_zero() {
        return Err(ECDSAInvalidSignature {}.into());
    }
    Ok(recovered)
}

/// Encodes call data for the `ecRecover` EVM precompile.
fn encode_calldata(hash: B256, v: u8, r: B256, s: B256) -> Vec<u8> {
    let calldata = EcRecoverData { hash, v, r, s };
    EcRecoverData::abi_encode(&calldata)
}

/// Validates the `s` value of a signature.
///
/// EIP-2 still allows signature malleability for the `ecRecover` precompile.
/// Appendix F in the [Ethereum Yellow paper], defines the valid range for s
/// in (301): `0 < s < secp256k1n ÷ 2 + 1`, and for v in (302): `v ∈ {27,
/// 28}`.
///
/// # Errors
///
/// If the `s` value is greater than [`SIGNATURE_S_UPPER_BOUND`], then the
/// error [`Error::InvalidSignatureS`] is returned.
///
/// [Ethereum Yellow paper]: https://ethereum.github.io/yellowpaper/paper.pdf
fn check_if_malleable(s: &B256) -> Result<(), Error> {
    let s_u256 = U256::from_be_slice(s.as_slice());
    if s_u256 > SIGNATURE_S_UPPER_BOUND {
        return Err(ECDSAInvalidSignatureS { s: *s }.into());
    }
    Ok(())
}
