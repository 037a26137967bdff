//! Implementation of nonce tracking for addresses.
//!
//! Nonces will only increment.
use alloy_primitives::{Address, U256};
use stylus_sdk::stylus_proc::{public, sol_storage};

const ONE: U256 = U256::from_limbs([1, 0, 0, 0]);

sol_storage! {
    /// State of a [`Nonces`] contract.
    pub struct Nonces {
        /// Mapping from address to its nonce.
        mapping(address => uint256) _nonces;
    }
}

#[public]
impl Nonces {
    /// Returns the unused nonce for the given `owner`.
    pub fn nonces(&self, owner: Address) -> U256 {
        self._nonces.get(owner)
    }
}

impl Nonces {
    /// Consumes a nonce for the given `owner`.
    ///
    /// Returns the current value and increments the stored nonce.
    ///
    /// # Panics
    ///
    /// If the nonce for the given `owner` exceeds [`U256::MAX`].
    pub fn use_nonce(&mut self, owner: Address) -> U256 {
        let nonce = self._nonces.get(owner);
        let updated = nonce
            .checked_add(ONE)
            .expect("nonce should not exceed `U256::MAX`");
        self._nonces.setter(owner).set(updated);

        nonce
    }
}
