//! Implementation of the GRID fungible token.
//!
//! GRID is a fixed-supply token with conventional ERC-20 transfer semantics
//! plus a signature-authorized redemption operation. Redemption permanently
//! destroys tokens: `total_supply` only ever decreases after construction,
//! while `initial_supply` records the amount minted at deployment forever.
//!
//! We have followed general `OpenZeppelin` Contracts guidelines: functions
//! revert instead of returning `false` on failure.
//!
//! The contract deliberately has no receive or fallback function, so bare
//! value transfers to the token revert.
use alloc::string::String;

use alloy_primitives::{aliases::U8, keccak256, Address, B256, U256};
use alloy_sol_types::sol;
use stylus_sdk::{
    call::MethodError,
    contract, evm, msg,
    prelude::*,
    stylus_proc::{public, sol_storage, SolidityError},
};

use crate::utils::{
    cryptography::{ecdsa, message_hash_utils::to_eth_signed_message_hash},
    nonces::Nonces,
};

sol! {
    /// Emitted when `value` tokens are moved from one account (`from`) to
    /// another (`to`).
    ///
    /// Note that `value` may be zero.
    #[allow(missing_docs)]
    event Transfer(address indexed from, address indexed to, uint256 value);
    /// Emitted when the allowance of a `spender` for an `owner` is set by a
    /// call to `approve`. `value` is the new allowance.
    #[allow(missing_docs)]
    event Approval(address indexed owner, address indexed spender, uint256 value);
    /// Emitted when `holder` proves a redemption of `value` tokens,
    /// consuming `nonce`.
    #[allow(missing_docs)]
    event Redemption(address indexed holder, uint256 value, uint256 nonce);
}

sol! {
    /// Indicates an error related to the current `balance` of `sender`. Used
    /// in transfers.
    ///
    /// * `sender` - Address whose tokens are being transferred.
    /// * `balance` - Current balance for the interacting account.
    /// * `needed` - Minimum amount required to perform a transfer.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error ERC20InsufficientBalance(address sender, uint256 balance, uint256 needed);
    /// Indicates a failure with the token `sender`. Used in transfers.
    ///
    /// * `sender` - Address whose tokens are being transferred.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error ERC20InvalidSender(address sender);
    /// Indicates a failure with the token `receiver`. Used in transfers.
    ///
    /// * `receiver` - Address to which the tokens are being transferred.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error ERC20InvalidReceiver(address receiver);
    /// Indicates a failure with the `spender`'s `allowance`. Used in
    /// transfers.
    ///
    /// * `spender` - Address that may be allowed to operate on tokens without
    /// being their owner.
    /// * `allowance` - Amount of tokens a `spender` is allowed to operate
    /// with.
    /// * `needed` - Minimum amount required to perform a transfer.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error ERC20InsufficientAllowance(address spender, uint256 allowance, uint256 needed);
    /// Indicates a failure with the `spender` to be approved. Used in
    /// approvals.
    ///
    /// * `spender` - Address that may be allowed to operate on tokens without
    /// being their owner.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error ERC20InvalidSpender(address spender);
    /// Indicates a failure with the `approver` of a token to be approved.
    /// Used in approvals.
    ///
    /// * `approver` - Address initiating an approval operation.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error ERC20InvalidApprover(address approver);
    /// Indicates that the recovered signer of a redemption proof does not
    /// match the account claiming the redemption.
    ///
    /// * `signer` - Address recovered from the signature.
    /// * `expected` - Account that claimed the redemption.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error GridInvalidSigner(address signer, address expected);
}

/// A [`Grid`] token error.
///
/// The transfer errors are defined as described in [ERC-6093].
///
/// [ERC-6093]: https://eips.ethereum.org/EIPS/eip-6093
#[derive(SolidityError, Debug)]
pub enum Error {
    /// Indicates an error related to the current balance of `sender`. Used
    /// in transfers.
    InsufficientBalance(ERC20InsufficientBalance),
    /// Indicates a failure with the token `sender`. Used in transfers.
    InvalidSender(ERC20InvalidSender),
    /// Indicates a failure with the token `receiver`. Used in transfers.
    InvalidReceiver(ERC20InvalidReceiver),
    /// Indicates a failure with the `spender`'s `allowance`. Used in
    /// transfers.
    InsufficientAllowance(ERC20InsufficientAllowance),
    /// Indicates a failure with the `spender` to be approved. Used in
    /// approvals.
    InvalidSpender(ERC20InvalidSpender),
    /// Indicates a failure with the `approver` of a token to be approved.
    /// Used in approvals.
    InvalidApprover(ERC20InvalidApprover),
    /// Indicates that the recovered signer of a redemption proof does not
    /// match the account claiming the redemption.
    InvalidSigner(GridInvalidSigner),
    /// The signature derives the [`Address::ZERO`].
    InvalidSignature(ecdsa::ECDSAInvalidSignature),
    /// The signature has an `S` value that is in the upper half order.
    InvalidSignatureS(ecdsa::ECDSAInvalidSignatureS),
}

impl MethodError for Error {
    fn encode(self) -> alloc::vec::Vec<u8> {
        self.into()
    }
}

impl From<ecdsa::Error> for Error {
    fn from(value: ecdsa::Error) -> Self {
        match value {
            ecdsa::Error::InvalidSignature(e) => Error::InvalidSignature(e),
            ecdsa::Error::InvalidSignatureS(e) => Error::InvalidSignatureS(e),
        }
    }
}

sol_storage! {
    /// State of a [`Grid`] token.
    pub struct Grid {
        /// Maps users to balances.
        mapping(address => uint256) _balances;
        /// Maps users to a mapping of each spender's allowance.
        mapping(address => mapping(address => uint256)) _allowances;
        /// The circulating supply of the token. Decreases on redemption.
        uint256 _total_supply;
        /// The supply minted at construction. Never changes afterwards.
        uint256 _initial_supply;
        /// Token name.
        string _name;
        /// Token symbol.
        string _symbol;
        /// Token contract version.
        string _version;
        /// Number of display decimals.
        uint8 _decimals;
        /// This field should be unnecessary once constructors are supported
        /// in the SDK.
        bool _initialized;
        /// Per-holder redemption nonces.
        Nonces nonces;
    }
}

/// NOTE: Implementation of [`TopLevelStorage`] to be able use `&mut self`
/// when calling other contracts and not `&mut (impl TopLevelStorage +
/// BorrowMut<Self>)`. Should be fixed in the future by the Stylus team.
unsafe impl TopLevelStorage for Grid {}

/// Returns the canonical redemption message for a `value` redemption against
/// the token deployed at `token`, authorized by the holder's current
/// `nonce`.
///
/// The message is the keccak256 digest of the packed encoding
/// `value (32 bytes) || token (20 bytes) || nonce (32 bytes)`. Binding the
/// nonce makes every signature single-use; binding the token address keeps a
/// proof from being replayed against another deployment.
#[must_use]
pub fn redemption_message(token: Address, value: U256, nonce: U256) -> B256 {
    let mut preimage = [0u8; 84];
    preimage[..32].copy_from_slice(&value.to_be_bytes::<32>());
    preimage[32..52].copy_from_slice(token.as_slice());
    preimage[52..].copy_from_slice(&nonce.to_be_bytes::<32>());
    keccak256(preimage)
}

#[public]
impl Grid {
    /// Initializes a [`Grid`] token with the passed metadata and mints
    /// `initial_supply` to the deployer.
    ///
    /// Note that there are no setters for these fields. This makes them
    /// immutable: they can only be set once at construction.
    ///
    /// # Arguments
    ///
    /// * `&mut self` - Write access to the contract's state.
    /// * `initial_supply` - Amount minted, once, to the deployer.
    /// * `name` - The name of the token.
    /// * `decimals` - Number of display decimals.
    /// * `symbol` - The symbol of the token.
    /// * `version` - The version of the token contract.
    ///
    /// # Errors
    ///
    /// If the deployer is `Address::ZERO`, then the error
    /// [`Error::InvalidReceiver`] is returned.
    ///
    /// # Panics
    ///
    /// If the contract is already initialized, then this function panics.
    /// This ensures the contract is constructed only once.
    ///
    /// # Events
    ///
    /// Emits a [`Transfer`] event with `from` set to `Address::ZERO`.
    pub fn constructor(
        &mut self,
        initial_supply: U256,
        name: String,
        decimals: u8,
        symbol: String,
        version: String,
    ) -> Result<(), Error> {
        let is_initialized = self._initialized.get();
        assert!(!is_initialized, "Grid has already been initialized");

        self._name.set_str(name);
        self._symbol.set_str(symbol);
        self._version.set_str(version);
        self._decimals.set(U8::from(decimals));
        self._initial_supply.set(initial_supply);
        self._initialized.set(true);

        self._mint(msg::sender(), initial_supply)
    }

    /// Returns the name of the token.
    pub fn name(&self) -> String {
        self._name.get_string()
    }

    /// Returns the symbol of the token, usually a shorter version of the
    /// name.
    pub fn symbol(&self) -> String {
        self._symbol.get_string()
    }

    /// Returns the number of decimals used to get a user-friendly
    /// representation of values of this token.
    ///
    /// NOTE: This information is only used for *display* purposes: in
    /// no way it affects any of the arithmetic of the contract.
    pub fn decimals(&self) -> u8 {
        self._decimals.get().to()
    }

    /// Returns the version of the token contract.
    pub fn version(&self) -> String {
        self._version.get_string()
    }

    /// Returns the number of tokens in circulation.
    pub fn total_supply(&self) -> U256 {
        self._total_supply.get()
    }

    /// Returns the number of tokens minted at construction.
    ///
    /// Unlike [`Grid::total_supply`], this figure is unaffected by
    /// redemptions.
    pub fn initial_supply(&self) -> U256 {
        self._initial_supply.get()
    }

    /// Returns the number of tokens owned by `account`.
    pub fn balance_of(&self, account: Address) -> U256 {
        self._balances.get(account)
    }

    /// Moves a `value` amount of tokens from the caller's account to `to`.
    ///
    /// Returns a boolean value indicating whether the operation succeeded.
    ///
    /// # Errors
    ///
    /// * If the `to` address is `Address::ZERO`, then the error
    /// [`Error::InvalidReceiver`] is returned.
    /// * If the caller doesn't have a balance of at least `value`, then the
    /// error [`Error::InsufficientBalance`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Transfer`] event.
    pub fn transfer(&mut self, to: Address, value: U256) -> Result<bool, Error> {
        let from = msg::sender();
        self._transfer(from, to, value)?;
        Ok(true)
    }

    /// Returns the remaining number of tokens that `spender` will be allowed
    /// to spend on behalf of `owner` through `transfer_from`. This is zero
    /// by default.
    ///
    /// This value changes when `approve` or `transfer_from` are called.
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self._allowances.get(owner).get(spender)
    }

    /// Sets a `value` number of tokens as the allowance of `spender` over
    /// the caller's tokens.
    ///
    /// The previous allowance is overwritten, not accumulated.
    ///
    /// Returns a boolean value indicating whether the operation succeeded.
    ///
    /// WARNING: Beware that changing an allowance with this method brings
    /// the risk that someone may use both the old and the new allowance by
    /// unfortunate transaction ordering. One possible solution to mitigate
    /// this race condition is to first reduce the `spender`'s allowance to 0
    /// and set the desired value afterwards:
    /// <https://github.com/ethereum/EIPs/issues/20#issuecomment-263524729>
    ///
    /// # Errors
    ///
    /// If the `spender` address is `Address::ZERO`, then the error
    /// [`Error::InvalidSpender`] is returned.
    ///
    /// # Events
    ///
    /// Emits an [`Approval`] event.
    pub fn approve(
        &mut self,
        spender: Address,
        value: U256,
    ) -> Result<bool, Error> {
        let owner = msg::sender();
        self._approve(owner, spender, value, true)
    }

    /// Moves a `value` number of tokens from `from` to `to` using the
    /// allowance mechanism. `value` is then deducted from the caller's
    /// allowance.
    ///
    /// Returns a boolean value indicating whether the operation succeeded.
    ///
    /// NOTE: If `value` is the maximum `U256::MAX`, the allowance is not
    /// updated on `transfer_from`. This is semantically equivalent to
    /// an infinite approval.
    ///
    /// # Errors
    ///
    /// * If the `from` address is `Address::ZERO`, then the error
    /// [`Error::InvalidSender`] is returned.
    /// * If the `to` address is `Address::ZERO`, then the error
    /// [`Error::InvalidReceiver`] is returned.
    /// * If not enough allowance is available, then the error
    /// [`Error::InsufficientAllowance`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Transfer`] event.
    pub fn transfer_from(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<bool, Error> {
        let spender = msg::sender();
        self._spend_allowance(from, spender, value)?;
        self._transfer(from, to, value)?;
        Ok(true)
    }

    /// Returns the unused redemption nonce for `owner`.
    ///
    /// A redemption proof is only valid over this exact value; each
    /// successful redemption consumes it.
    pub fn redemption_nonce(&self, owner: Address) -> U256 {
        self.nonces.nonces(owner)
    }

    /// Destroys a `value` amount of the caller's tokens, authorized by an
    /// ECDSA signature over the caller's current redemption nonce.
    ///
    /// The signed message is
    /// [`redemption_message`] wrapped in the ERC-191 personal-message
    /// envelope, so proofs can be produced with `eth_sign`-style wallet
    /// APIs. The recovered signer must be the caller: a redemption can only
    /// be claimed by the account that authorized it.
    ///
    /// # Arguments
    ///
    /// * `&mut self` - Write access to the contract's state.
    /// * `value` - Number of tokens to redeem.
    /// * `v` - `v` value from the signature.
    /// * `r` - `r` value from the signature.
    /// * `s` - `s` value from the signature.
    ///
    /// # Errors
    ///
    /// * If the signature is malleable or derives `Address::ZERO`, then an
    /// ECDSA error is returned.
    /// * If the recovered signer is not the caller, then the error
    /// [`Error::InvalidSigner`] is returned.
    /// * If the caller doesn't have a balance of at least `value`, then the
    /// error [`Error::InsufficientBalance`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Redemption`] event and a [`Transfer`] event with `to` set
    /// to `Address::ZERO`.
    pub fn provable_redemption(
        &mut self,
        value: U256,
        v: u8,
        r: B256,
        s: B256,
    ) -> Result<(), Error> {
        let holder = msg::sender();
        let nonce = self.nonces.nonces(holder);
        let message = redemption_message(contract::address(), value, nonce);
        let digest = to_eth_signed_message_hash(&message.0);

        self._redeem(holder, digest, value, v, r, s)
    }
}

impl Grid {
    /// Sets a `value` number of tokens as the allowance of `spender` over
    /// the `owner`'s tokens.
    ///
    /// # Errors
    ///
    /// * If the `owner` address is `Address::ZERO`, then the error
    /// [`Error::InvalidApprover`] is returned.
    /// * If the `spender` address is `Address::ZERO`, then the error
    /// [`Error::InvalidSpender`] is returned.
    ///
    /// # Events
    ///
    /// Emits an [`Approval`] event when `emit_event` is set.
    fn _approve(
        &mut self,
        owner: Address,
        spender: Address,
        value: U256,
        emit_event: bool,
    ) -> Result<bool, Error> {
        if owner.is_zero() {
            return Err(Error::InvalidApprover(ERC20InvalidApprover {
                approver: Address::ZERO,
            }));
        }

        if spender.is_zero() {
            return Err(Error::InvalidSpender(ERC20InvalidSpender {
                spender: Address::ZERO,
            }));
        }

        self._allowances.setter(owner).insert(spender, value);
        if emit_event {
            evm::log(Approval { owner, spender, value });
        }
        Ok(true)
    }

    /// Internal implementation of transferring tokens between two accounts.
    ///
    /// # Errors
    ///
    /// * If the `from` address is `Address::ZERO`, then the error
    /// [`Error::InvalidSender`] is returned.
    /// * If the `to` address is `Address::ZERO`, then the error
    /// [`Error::InvalidReceiver`] is returned.
    /// * If the `from` address doesn't have enough tokens, then the error
    /// [`Error::InsufficientBalance`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Transfer`] event.
    fn _transfer(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), Error> {
        if from.is_zero() {
            return Err(Error::InvalidSender(ERC20InvalidSender {
                sender: Address::ZERO,
            }));
        }
        if to.is_zero() {
            return Err(Error::InvalidReceiver(ERC20InvalidReceiver {
                receiver: Address::ZERO,
            }));
        }

        self._update(from, to, value)?;

        Ok(())
    }

    /// Creates a `value` amount of tokens and assigns them to `account`, by
    /// transferring it from `Address::ZERO`.
    ///
    /// Relies on the `_update` mechanism.
    ///
    /// # Panics
    ///
    /// If `_total_supply` exceeds `U256::MAX`.
    ///
    /// # Errors
    ///
    /// If the `account` address is `Address::ZERO`, then the error
    /// [`Error::InvalidReceiver`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Transfer`] event.
    fn _mint(&mut self, account: Address, value: U256) -> Result<(), Error> {
        if account.is_zero() {
            return Err(Error::InvalidReceiver(ERC20InvalidReceiver {
                receiver: Address::ZERO,
            }));
        }
        self._update(Address::ZERO, account, value)
    }

    /// Transfers a `value` amount of tokens from `from` to `to`, or
    /// alternatively mints (or burns) if `from` (or `to`) is the zero
    /// address.
    ///
    /// All customizations to transfers, mints, and burns should be done by
    /// using this function.
    ///
    /// # Panics
    ///
    /// If `_total_supply` exceeds `U256::MAX`. It may happen during the
    /// `_mint` operation.
    ///
    /// # Errors
    ///
    /// If the `from` address doesn't have enough tokens, then the error
    /// [`Error::InsufficientBalance`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Transfer`] event.
    fn _update(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), Error> {
        if from.is_zero() {
            // Mint operation. Overflow check required: the rest of the code
            // assumes that `_total_supply` never overflows.
            let total_supply = self
                ._total_supply
                .get()
                .checked_add(value)
                .expect("should not exceed `U256::MAX` for `_total_supply`");
            self._total_supply.set(total_supply);
        } else {
            let from_balance = self._balances.get(from);
            if from_balance < value {
                return Err(Error::InsufficientBalance(
                    ERC20InsufficientBalance {
                        sender: from,
                        balance: from_balance,
                        needed: value,
                    },
                ));
            }
            // Overflow not possible:
            // `value` <= `from_balance` <= `_total_supply`.
            self._balances.setter(from).set(from_balance - value);
        }

        if to.is_zero() {
            let total_supply = self._total_supply.get();
            // Overflow not possible:
            // `value` <= `_total_supply` or
            // `value` <= `from_balance` <= `_total_supply`.
            self._total_supply.set(total_supply - value);
        } else {
            let balance_to = self._balances.get(to);
            // Overflow not possible:
            // `balance_to` + `value` is at most `total_supply`,
            // which fits into a `U256`.
            self._balances.setter(to).set(balance_to + value);
        }

        evm::log(Transfer { from, to, value });

        Ok(())
    }

    /// Destroys a `value` amount of tokens from `account`, lowering the
    /// total supply.
    ///
    /// Relies on the `_update` mechanism.
    ///
    /// # Errors
    ///
    /// * If the `account` address is `Address::ZERO`, then the error
    /// [`Error::InvalidSender`] is returned.
    /// * If the `account` address doesn't have enough tokens, then the error
    /// [`Error::InsufficientBalance`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Transfer`] event.
    fn _burn(&mut self, account: Address, value: U256) -> Result<(), Error> {
        if account == Address::ZERO {
            return Err(Error::InvalidSender(ERC20InvalidSender {
                sender: Address::ZERO,
            }));
        }
        self._update(account, Address::ZERO, value)
    }

    /// Updates `owner`'s allowance for `spender` based on spent `value`.
    ///
    /// Does not update the allowance value in the case of infinite
    /// allowance.
    ///
    /// # Errors
    ///
    /// If not enough allowance is available, then the error
    /// [`Error::InsufficientAllowance`] is returned.
    fn _spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        value: U256,
    ) -> Result<(), Error> {
        let current_allowance = self.allowance(owner, spender);
        if current_allowance != U256::MAX {
            if current_allowance < value {
                return Err(Error::InsufficientAllowance(
                    ERC20InsufficientAllowance {
                        spender,
                        allowance: current_allowance,
                        needed: value,
                    },
                ));
            }

            self._approve(owner, spender, current_allowance - value, false)?;
        }

        Ok(())
    }

    /// Verifies a redemption proof over `digest` and, when valid, burns
    /// `value` from `holder` and consumes the holder's nonce.
    ///
    /// # Errors
    ///
    /// * If the signature is malleable or derives `Address::ZERO`, then an
    /// ECDSA error is returned.
    /// * If the recovered signer is not `holder`, then the error
    /// [`Error::InvalidSigner`] is returned.
    /// * If `holder` doesn't have a balance of at least `value`, then the
    /// error [`Error::InsufficientBalance`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Redemption`] event and a [`Transfer`] event.
    fn _redeem(
        &mut self,
        holder: Address,
        digest: B256,
        value: U256,
        v: u8,
        r: B256,
        s: B256,
    ) -> Result<(), Error> {
        let signer = ecdsa::recover(self, digest, v, r, s)?;
        if signer != holder {
            return Err(Error::InvalidSigner(GridInvalidSigner {
                signer,
                expected: holder,
            }));
        }

        self._burn(holder, value)?;
        let nonce = self.nonces.use_nonce(holder);
        evm::log(Redemption { holder, value, nonce });

        Ok(())
    }
}
