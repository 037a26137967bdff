//! A sale contract that custodies native currency against a future payout of
//! GRID tokens.
//!
//! The sale is driven entirely by block height. An admin configures the
//! window and the price curve, then a cap, after which anyone may contribute
//! within the window (whitelisted accounts may contribute before it opens).
//! Once the window closes, every contributor's payout is priced by the same
//! final rate, derived from the height of the last accepted contribution.
//! The admin can freeze an ongoing sale with [`Sale::escape`], which routes
//! every outstanding contribution to the refund path instead.
//!
//! Contributions must go through [`Sale::contribute`]: the contract defines
//! no receive function, so bare value transfers revert.
use alloc::string::{String, ToString};

use alloy_primitives::{aliases::U8, Address, U256};
use alloy_sol_types::sol;
use stylus_sdk::{
    block,
    call::{call, Call, MethodError},
    contract, evm, msg,
    prelude::*,
    stylus_proc::{public, sol_interface, sol_storage, SolidityError},
};

use crate::{
    access::admin::{
        self, Admin, AdminInvalidAccount, AdminUnauthorizedAccount,
    },
    finance::pricing,
};

/// Lifecycle of a [`Sale`].
///
/// `Unconfigured`, `Configured`, `CapSet` and `Escaped` are stored;
/// `Open`, `Ended` and `Closed` are derived from the stored state, the
/// current block height and the outstanding contribution total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    /// Deployed, no parameters set.
    Unconfigured = 0,
    /// Window and price curve set, no cap yet.
    Configured = 1,
    /// Cap and price ceiling set; presale contributions allowed.
    CapSet = 2,
    /// Between `start` and `end`; open to everyone.
    Open = 3,
    /// Window closed; rewards withdrawable.
    Ended = 4,
    /// Frozen by the admin; refunds only.
    Escaped = 5,
    /// Every contribution has been settled.
    Closed = 6,
}

sol_interface! {
    interface IGrid {
        function transfer(address to, uint256 value) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }
}

sol! {
    /// Emitted once the sale window and price curve are set.
    #[allow(missing_docs)]
    event SaleConfigured(uint256 start, uint256 end, uint256 y_int_denom, uint256 m_denom);
    /// Emitted once the contribution cap and price ceiling are set.
    #[allow(missing_docs)]
    event SaleCapSet(uint256 cap, uint256 rmax);
    /// Emitted when `account` is whitelisted for the presale window.
    #[allow(missing_docs)]
    event PresaleWhitelisted(address indexed account);
    /// Emitted when `account` is removed from the presale and refunded
    /// `amount`.
    #[allow(missing_docs)]
    event PresaleVented(address indexed account, uint256 amount);
    /// Emitted when a contribution is accepted. `total` is the outstanding
    /// contribution total after this one.
    #[allow(missing_docs)]
    event Contributed(address indexed contributor, uint256 amount, uint256 total);
    /// Emitted when the admin freezes the sale.
    #[allow(missing_docs)]
    event SaleEscaped();
    /// Emitted when `contributor`'s stake is settled for a token reward.
    #[allow(missing_docs)]
    event Withdrawn(address indexed contributor, uint256 contribution, uint256 reward);
    /// Emitted when `contributor`'s stake is refunded after an escape.
    #[allow(missing_docs)]
    event Aborted(address indexed contributor, uint256 amount);
    /// Emitted when the remaining token balance is swept to `dest`.
    #[allow(missing_docs)]
    event GridSwept(address indexed dest, uint256 amount);
    /// Emitted when the remaining native balance is swept to `dest`.
    #[allow(missing_docs)]
    event FundsSwept(address indexed dest, uint256 amount);
}

sol! {
    /// The operation is not valid in the sale's current `phase`.
    ///
    /// * `phase` - Discriminant of the phase the sale is in.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleInvalidPhase(uint8 phase);
    /// The one-shot configuration step has already run.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleAlreadyConfigured();
    /// A configuration parameter is out of range (zero length, zero
    /// denominator, or an overflowing window).
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleInvalidConfiguration();
    /// The supplied cap or price ceiling is not a valid value.
    ///
    /// * `cap` - Value that was rejected.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleInvalidCap(uint256 cap);
    /// Accepting the contribution would push the outstanding total past the
    /// cap.
    ///
    /// * `requested` - Total the contribution would have produced.
    /// * `cap` - Configured contribution cap.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleCapExceeded(uint256 requested, uint256 cap);
    /// Zero-value contributions are rejected.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleZeroContribution();
    /// The account is not whitelisted for the presale window.
    ///
    /// * `account` - Account that attempted the presale operation.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleNotPresaler(address account);
    /// The account has no outstanding contribution to settle.
    ///
    /// * `account` - Account whose settlement was requested.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleNothingToSettle(address account);
    /// The token address is not valid (eg. `Address::ZERO`).
    ///
    /// * `token` - Address that was rejected.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleInvalidToken(address token);
    /// Indicates an error related to an underlying native-currency transfer.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleEtherTransferFailed(string reason);
    /// Indicates that a low-level call failed.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error SaleFailedCall();
}

/// An error that occurred in the [`Sale`] contract.
#[derive(SolidityError, Debug)]
pub enum Error {
    /// The caller account is not authorized to perform an operation.
    UnauthorizedAccount(AdminUnauthorizedAccount),
    /// The account is not a valid admin account.
    InvalidAccount(AdminInvalidAccount),
    /// The operation is not valid in the sale's current phase.
    InvalidPhase(SaleInvalidPhase),
    /// The one-shot configuration step has already run.
    AlreadyConfigured(SaleAlreadyConfigured),
    /// A configuration parameter is out of range.
    InvalidConfiguration(SaleInvalidConfiguration),
    /// The supplied cap or price ceiling is not a valid value.
    InvalidCap(SaleInvalidCap),
    /// Accepting the contribution would push the outstanding total past the
    /// cap.
    CapExceeded(SaleCapExceeded),
    /// Zero-value contributions are rejected.
    ZeroContribution(SaleZeroContribution),
    /// The account is not whitelisted for the presale window.
    NotPresaler(SaleNotPresaler),
    /// The account has no outstanding contribution to settle.
    NothingToSettle(SaleNothingToSettle),
    /// The token address is not valid.
    InvalidToken(SaleInvalidToken),
    /// Indicates an error related to an underlying native-currency transfer.
    EtherTransferFailed(SaleEtherTransferFailed),
    /// Indicates that a low-level call failed.
    FailedCall(SaleFailedCall),
}

impl From<admin::Error> for Error {
    fn from(value: admin::Error) -> Self {
        match value {
            admin::Error::UnauthorizedAccount(e) => {
                Error::UnauthorizedAccount(e)
            }
            admin::Error::InvalidAccount(e) => Error::InvalidAccount(e),
        }
    }
}

impl From<stylus_sdk::call::Error> for Error {
    fn from(value: stylus_sdk::call::Error) -> Self {
        match value {
            stylus_sdk::call::Error::AbiDecodingFailed(_) => {
                Error::FailedCall(SaleFailedCall {})
            }
            stylus_sdk::call::Error::Revert(reason) => {
                Error::EtherTransferFailed(SaleEtherTransferFailed {
                    reason: String::from_utf8_lossy(&reason).to_string(),
                })
            }
        }
    }
}

impl MethodError for Error {
    fn encode(self) -> alloc::vec::Vec<u8> {
        self.into()
    }
}

sol_storage! {
    /// State of a [`Sale`] contract.
    pub struct Sale {
        /// [`Admin`] contract.
        Admin admin;
        /// Address of the GRID token paid out as rewards.
        address _grid;
        /// Price ceiling of the rate curve.
        uint256 _rmax;
        /// Divisor of the intercept term of the rate curve.
        uint256 _y_int_denom;
        /// Divisor of the slope term of the rate curve.
        uint256 _m_denom;
        /// First block of the open window.
        uint256 _start;
        /// First block past the open window.
        uint256 _end;
        /// Contribution cap in wei.
        uint256 _cap;
        /// Outstanding (unsettled) contribution total.
        uint256 _wei_remaining;
        /// Height of the last accepted contribution.
        uint256 _last_contribution_block;
        /// Maps contributors to their unsettled stake.
        mapping(address => uint256) _contributions;
        /// Maps accounts to their presale whitelist flag.
        mapping(address => bool) _presalers;
        /// Stored lifecycle phase.
        uint8 _phase;
        /// This field should be unnecessary once constructors are supported
        /// in the SDK.
        bool _initialized;
    }
}

/// NOTE: Implementation of [`TopLevelStorage`] to be able use `&mut self`
/// when calling other contracts and not `&mut (impl TopLevelStorage +
/// BorrowMut<Self>)`. Should be fixed in the future by the Stylus team.
unsafe impl TopLevelStorage for Sale {}

#[public]
impl Sale {
    /// Initializes a [`Sale`] bound to the GRID token at `grid` and makes
    /// the deployer its admin.
    ///
    /// # Errors
    ///
    /// If `grid` is `Address::ZERO`, then the error [`Error::InvalidToken`]
    /// is returned.
    ///
    /// # Panics
    ///
    /// If the contract is already initialized, then this function panics.
    /// This ensures the contract is constructed only once.
    pub fn constructor(&mut self, grid: Address) -> Result<(), Error> {
        let is_initialized = self._initialized.get();
        assert!(!is_initialized, "Sale has already been initialized");

        if grid.is_zero() {
            return Err(Error::InvalidToken(SaleInvalidToken {
                token: Address::ZERO,
            }));
        }

        self._grid.set(grid);
        self._initialized.set(true);
        self.admin._switch_admin(msg::sender());

        Ok(())
    }

    /// Returns the address of the current admin.
    pub fn admin(&self) -> Address {
        self.admin.admin()
    }

    /// Hands the admin role over to `new_admin`. Can only be called by the
    /// current admin.
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    /// If `new_admin` is `Address::ZERO`, then the error
    /// [`Error::InvalidAccount`] is returned.
    ///
    /// # Events
    ///
    /// Emits an [`admin::AdminSwitched`] event.
    pub fn switch_admin(&mut self, new_admin: Address) -> Result<(), Error> {
        Ok(self.admin.switch_admin(new_admin)?)
    }

    /// Returns the address of the GRID token paid out as rewards.
    pub fn grid(&self) -> Address {
        self._grid.get()
    }

    /// Returns the first block of the open window.
    pub fn start(&self) -> U256 {
        self._start.get()
    }

    /// Returns the first block past the open window.
    pub fn end(&self) -> U256 {
        self._end.get()
    }

    /// Returns the contribution cap in wei.
    pub fn cap(&self) -> U256 {
        self._cap.get()
    }

    /// Returns the price ceiling of the rate curve.
    pub fn rmax(&self) -> U256 {
        self._rmax.get()
    }

    /// Returns the outstanding (unsettled) contribution total.
    pub fn wei_remaining(&self) -> U256 {
        self._wei_remaining.get()
    }

    /// Returns `account`'s unsettled contribution.
    pub fn contribution(&self, account: Address) -> U256 {
        self._contributions.get(account)
    }

    /// Returns whether `account` is whitelisted for the presale window.
    pub fn is_presaler(&self, account: Address) -> bool {
        self._presalers.get(account)
    }

    /// Returns the discriminant of the sale's current [`Phase`].
    pub fn phase(&self) -> u8 {
        self.phase_at(U256::from(block::number())) as u8
    }

    /// Returns the current token-per-wei rate of the sale.
    ///
    /// Before the cap is set there is no curve, so the rate is zero. The
    /// rate only moves when a contribution is accepted; after the window
    /// closes it is final.
    pub fn final_price(&self) -> U256 {
        self._final_price()
    }

    /// Returns the token reward `account`'s unsettled contribution is
    /// currently worth, including the presale bonus where it applies.
    pub fn reward_of(&self, account: Address) -> U256 {
        self._reward_of(account)
    }

    /// Sets the sale window and price curve. Single shot; can only be
    /// called by the admin.
    ///
    /// # Arguments
    ///
    /// * `&mut self` - Write access to the contract's state.
    /// * `start` - First block of the open window.
    /// * `length` - Number of blocks the window stays open.
    /// * `y_int_denom` - Divisor of the intercept term of the rate curve.
    /// * `m_denom` - Divisor of the slope term of the rate curve.
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    /// If the sale has already been configured, then the error
    /// [`Error::AlreadyConfigured`] is returned.
    /// If `length` or either denominator is zero, or `start + length`
    /// overflows, then the error [`Error::InvalidConfiguration`] is
    /// returned.
    ///
    /// # Events
    ///
    /// Emits a [`SaleConfigured`] event.
    pub fn setup_sale(
        &mut self,
        start: U256,
        length: U256,
        y_int_denom: U256,
        m_denom: U256,
    ) -> Result<(), Error> {
        self.admin.only_admin()?;

        if self.stored_phase() != Phase::Unconfigured {
            return Err(Error::AlreadyConfigured(SaleAlreadyConfigured {}));
        }

        if length.is_zero() || y_int_denom.is_zero() || m_denom.is_zero() {
            return Err(Error::InvalidConfiguration(
                SaleInvalidConfiguration {},
            ));
        }
        let end = start.checked_add(length).ok_or(
            Error::InvalidConfiguration(SaleInvalidConfiguration {}),
        )?;

        self._start.set(start);
        self._end.set(end);
        self._y_int_denom.set(y_int_denom);
        self._m_denom.set(m_denom);
        self.set_stored_phase(Phase::Configured);

        evm::log(SaleConfigured { start, end, y_int_denom, m_denom });

        Ok(())
    }

    /// Sets the contribution cap and the price ceiling. Single shot; can
    /// only be called by the admin, after [`Sale::setup_sale`].
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    /// If the sale is not configured yet (or was escaped), then the error
    /// [`Error::InvalidPhase`] is returned.
    /// If the cap has already been set, then the error
    /// [`Error::AlreadyConfigured`] is returned.
    /// If `cap` or `rmax` is zero, then the error [`Error::InvalidCap`] is
    /// returned.
    ///
    /// # Events
    ///
    /// Emits a [`SaleCapSet`] event.
    pub fn set_cap(&mut self, cap: U256, rmax: U256) -> Result<(), Error> {
        self.admin.only_admin()?;

        match self.stored_phase() {
            Phase::Configured => {}
            Phase::CapSet => {
                return Err(Error::AlreadyConfigured(SaleAlreadyConfigured {}))
            }
            phase => {
                return Err(Error::InvalidPhase(SaleInvalidPhase {
                    phase: phase as u8,
                }))
            }
        }

        if cap.is_zero() {
            return Err(Error::InvalidCap(SaleInvalidCap { cap }));
        }
        if rmax.is_zero() {
            return Err(Error::InvalidCap(SaleInvalidCap { cap: rmax }));
        }

        self._cap.set(cap);
        self._rmax.set(rmax);
        self.set_stored_phase(Phase::CapSet);

        evm::log(SaleCapSet { cap, rmax });

        Ok(())
    }

    /// Whitelists `account` for the presale window. Can only be called by
    /// the admin, before the window opens.
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    /// If the sale is not configured, has escaped, or the window has
    /// already opened, then the error [`Error::InvalidPhase`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`PresaleWhitelisted`] event.
    pub fn whitelist_presale(&mut self, account: Address) -> Result<(), Error> {
        self.admin.only_admin()?;
        self._whitelist_presale(account, U256::from(block::number()))
    }

    /// Removes `account` from the presale and refunds its contribution in
    /// full. Can only be called by the admin, before the window opens.
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    /// If `account` is not whitelisted, then the error
    /// [`Error::NotPresaler`] is returned.
    /// If the window has already opened, then the error
    /// [`Error::InvalidPhase`] is returned.
    /// If the refund transfer fails, then the error
    /// [`Error::EtherTransferFailed`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`PresaleVented`] event.
    pub fn vent_presale(&mut self, account: Address) -> Result<(), Error> {
        self.admin.only_admin()?;
        let amount =
            self._vent_presale(account, U256::from(block::number()))?;
        if !amount.is_zero() {
            call(Call::new_in(self).value(amount), account, &[])?;
        }
        Ok(())
    }

    /// Accepts the attached value as a contribution from the caller.
    ///
    /// Whitelisted accounts may contribute before the window opens; anyone
    /// may contribute while it is open. Every contribution counts against
    /// the cap and moves the price curve forward.
    ///
    /// # Errors
    ///
    /// If the attached value is zero, then the error
    /// [`Error::ZeroContribution`] is returned.
    /// If the sale is not accepting contributions at the current height,
    /// then the error [`Error::InvalidPhase`] is returned.
    /// If the caller is not whitelisted during the presale window, then the
    /// error [`Error::NotPresaler`] is returned.
    /// If the contribution would push the outstanding total past the cap,
    /// then the error [`Error::CapExceeded`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Contributed`] event.
    #[payable]
    pub fn contribute(&mut self) -> Result<(), Error> {
        self._contribute(
            msg::sender(),
            msg::value(),
            U256::from(block::number()),
        )
    }

    /// Freezes the sale. Can only be called by the admin while the sale is
    /// configured, cap-set or open.
    ///
    /// After an escape no contribution is accepted and every outstanding
    /// stake is only refundable through [`Sale::abort`].
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    /// If the sale has ended, closed, or was never configured, then the
    /// error [`Error::InvalidPhase`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`SaleEscaped`] event.
    pub fn escape(&mut self) -> Result<(), Error> {
        self.admin.only_admin()?;
        self._escape(U256::from(block::number()))
    }

    /// Settles `account`'s contribution for its token reward. Callable by
    /// anyone once the sale has ended.
    ///
    /// The stake is zeroed before the tokens move, so a stake can be
    /// settled exactly once.
    ///
    /// # Errors
    ///
    /// If the sale has not ended (or has escaped), then the error
    /// [`Error::InvalidPhase`] is returned.
    /// If `account` has no outstanding contribution, then the error
    /// [`Error::NothingToSettle`] is returned.
    /// If the token transfer fails, then the error [`Error::FailedCall`]
    /// is returned.
    ///
    /// # Events
    ///
    /// Emits a [`Withdrawn`] event.
    pub fn withdraw(&mut self, account: Address) -> Result<(), Error> {
        let reward =
            self._settle_withdraw(account, U256::from(block::number()))?;

        let grid = IGrid::new(self._grid.get());
        let ok = grid.transfer(Call::new_in(self), account, reward)?;
        if !ok {
            return Err(Error::FailedCall(SaleFailedCall {}));
        }
        Ok(())
    }

    /// Refunds `account`'s contribution in full. Callable by anyone once
    /// the sale has escaped.
    ///
    /// The stake is zeroed before the value moves, so a stake can be
    /// refunded exactly once.
    ///
    /// # Errors
    ///
    /// If the sale has not escaped, then the error [`Error::InvalidPhase`]
    /// is returned.
    /// If `account` has no outstanding contribution, then the error
    /// [`Error::NothingToSettle`] is returned.
    /// If the refund transfer fails, then the error
    /// [`Error::EtherTransferFailed`] is returned.
    ///
    /// # Events
    ///
    /// Emits an [`Aborted`] event.
    pub fn abort(&mut self, account: Address) -> Result<(), Error> {
        let amount =
            self._settle_abort(account, U256::from(block::number()))?;
        call(Call::new_in(self).value(amount), account, &[])?;
        Ok(())
    }

    /// Sweeps the contract's remaining GRID balance to `dest`. Can only be
    /// called by the admin once the sale has ended or escaped.
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    /// If the sale is still running, then the error [`Error::InvalidPhase`]
    /// is returned.
    /// If the token transfer fails, then the error [`Error::FailedCall`]
    /// is returned.
    ///
    /// # Events
    ///
    /// Emits a [`GridSwept`] event.
    pub fn move_grid(&mut self, dest: Address) -> Result<(), Error> {
        self.admin.only_admin()?;
        self._require_settleable(U256::from(block::number()))?;

        let grid = IGrid::new(self._grid.get());
        let amount =
            grid.balance_of(Call::new_in(self), contract::address())?;
        let ok = grid.transfer(Call::new_in(self), dest, amount)?;
        if !ok {
            return Err(Error::FailedCall(SaleFailedCall {}));
        }

        evm::log(GridSwept { dest, amount });
        Ok(())
    }

    /// Sweeps the contract's remaining native balance to `dest`. Can only
    /// be called by the admin once the sale has ended or escaped.
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    /// If the sale is still running, then the error [`Error::InvalidPhase`]
    /// is returned.
    /// If the transfer fails, then the error
    /// [`Error::EtherTransferFailed`] is returned.
    ///
    /// # Events
    ///
    /// Emits a [`FundsSwept`] event.
    pub fn move_funds(&mut self, dest: Address) -> Result<(), Error> {
        self.admin.only_admin()?;
        self._require_settleable(U256::from(block::number()))?;

        let amount = contract::balance();
        call(Call::new_in(self).value(amount), dest, &[])?;

        evm::log(FundsSwept { dest, amount });
        Ok(())
    }
}

impl Sale {
    /// Returns the stored lifecycle phase.
    fn stored_phase(&self) -> Phase {
        match self._phase.get().to::<u8>() {
            1 => Phase::Configured,
            2 => Phase::CapSet,
            5 => Phase::Escaped,
            _ => Phase::Unconfigured,
        }
    }

    fn set_stored_phase(&mut self, phase: Phase) {
        self._phase.set(U8::from(phase as u8));
    }

    /// Returns the sale's effective [`Phase`] at block `height`.
    ///
    /// `Open` and `Ended` are derived from the window bounds, and a sale
    /// that has ended or escaped with nothing left to settle is `Closed`.
    pub fn phase_at(&self, height: U256) -> Phase {
        match self.stored_phase() {
            Phase::Escaped => {
                if self._wei_remaining.get().is_zero() {
                    Phase::Closed
                } else {
                    Phase::Escaped
                }
            }
            Phase::CapSet => {
                if height >= self._end.get() {
                    if self._wei_remaining.get().is_zero() {
                        Phase::Closed
                    } else {
                        Phase::Ended
                    }
                } else if height >= self._start.get() {
                    Phase::Open
                } else {
                    Phase::CapSet
                }
            }
            phase => phase,
        }
    }

    /// Returns the current token-per-wei rate, or zero while there is no
    /// curve to price against.
    fn _final_price(&self) -> U256 {
        match self.stored_phase() {
            Phase::Unconfigured | Phase::Configured => U256::ZERO,
            _ => {
                // A sale whose only contributions came from the presale
                // window clears at the intercept.
                let elapsed = self
                    ._last_contribution_block
                    .get()
                    .checked_sub(self._start.get())
                    .unwrap_or(U256::ZERO);
                pricing::final_price(
                    self._rmax.get(),
                    self._y_int_denom.get(),
                    self._m_denom.get(),
                    elapsed,
                )
            }
        }
    }

    /// Returns the reward `account`'s unsettled stake is worth at the
    /// current rate. Presale participants earn a 15% bonus, floored.
    ///
    /// # Panics
    ///
    /// If the reward exceeds [`U256::MAX`].
    fn _reward_of(&self, account: Address) -> U256 {
        let contribution = self._contributions.get(account);
        let reward = contribution
            .checked_mul(self._final_price())
            .expect("reward should not exceed `U256::MAX`");

        if self._presalers.get(account) {
            reward
                .checked_mul(U256::from(115))
                .expect("reward should not exceed `U256::MAX`")
                / U256::from(100)
        } else {
            reward
        }
    }

    /// Whitelists `account` for the presale window at block `height`.
    fn _whitelist_presale(
        &mut self,
        account: Address,
        height: U256,
    ) -> Result<(), Error> {
        let phase = self.phase_at(height);
        match phase {
            Phase::Configured | Phase::CapSet => {}
            phase => {
                return Err(Error::InvalidPhase(SaleInvalidPhase {
                    phase: phase as u8,
                }))
            }
        }

        self._presalers.setter(account).set(true);
        evm::log(PresaleWhitelisted { account });

        Ok(())
    }

    /// Removes `account` from the presale at block `height`, zeroing its
    /// stake. Returns the amount to refund.
    fn _vent_presale(
        &mut self,
        account: Address,
        height: U256,
    ) -> Result<U256, Error> {
        let phase = self.phase_at(height);
        match phase {
            Phase::Configured | Phase::CapSet => {}
            phase => {
                return Err(Error::InvalidPhase(SaleInvalidPhase {
                    phase: phase as u8,
                }))
            }
        }

        if !self._presalers.get(account) {
            return Err(Error::NotPresaler(SaleNotPresaler { account }));
        }

        let amount = self._contributions.get(account);
        self._contributions.setter(account).set(U256::ZERO);
        self._presalers.setter(account).set(false);
        self._wei_remaining
            .set(self._wei_remaining.get() - amount);

        evm::log(PresaleVented { account, amount });

        Ok(amount)
    }

    /// Accepts `value` from `sender` at block `height`.
    fn _contribute(
        &mut self,
        sender: Address,
        value: U256,
        height: U256,
    ) -> Result<(), Error> {
        if value.is_zero() {
            return Err(Error::ZeroContribution(SaleZeroContribution {}));
        }

        let phase = self.phase_at(height);
        match phase {
            Phase::CapSet => {
                // Presale window.
                if !self._presalers.get(sender) {
                    return Err(Error::NotPresaler(SaleNotPresaler {
                        account: sender,
                    }));
                }
            }
            Phase::Open => {}
            phase => {
                return Err(Error::InvalidPhase(SaleInvalidPhase {
                    phase: phase as u8,
                }))
            }
        }

        let total = self
            ._wei_remaining
            .get()
            .checked_add(value)
            .expect("contribution total should not exceed `U256::MAX`");
        let cap = self._cap.get();
        if total > cap {
            return Err(Error::CapExceeded(SaleCapExceeded {
                requested: total,
                cap,
            }));
        }

        let contribution = self._contributions.get(sender);
        self._contributions.setter(sender).set(contribution + value);
        self._wei_remaining.set(total);
        self._last_contribution_block.set(height);

        evm::log(Contributed { contributor: sender, amount: value, total });

        Ok(())
    }

    /// Freezes the sale at block `height`.
    fn _escape(&mut self, height: U256) -> Result<(), Error> {
        let phase = self.phase_at(height);
        match phase {
            Phase::Configured | Phase::CapSet | Phase::Open => {}
            phase => {
                return Err(Error::InvalidPhase(SaleInvalidPhase {
                    phase: phase as u8,
                }))
            }
        }

        self.set_stored_phase(Phase::Escaped);
        evm::log(SaleEscaped {});

        Ok(())
    }

    /// Settles `account`'s stake for a reward at block `height`, zeroing
    /// the stake. Returns the reward to pay out.
    fn _settle_withdraw(
        &mut self,
        account: Address,
        height: U256,
    ) -> Result<U256, Error> {
        let phase = self.phase_at(height);
        if phase != Phase::Ended {
            return Err(Error::InvalidPhase(SaleInvalidPhase {
                phase: phase as u8,
            }));
        }

        let contribution = self._contributions.get(account);
        if contribution.is_zero() {
            return Err(Error::NothingToSettle(SaleNothingToSettle {
                account,
            }));
        }

        let reward = self._reward_of(account);
        self._contributions.setter(account).set(U256::ZERO);
        self._wei_remaining
            .set(self._wei_remaining.get() - contribution);

        evm::log(Withdrawn { contributor: account, contribution, reward });

        Ok(reward)
    }

    /// Settles `account`'s stake for a refund at block `height`, zeroing
    /// the stake. Returns the amount to refund.
    fn _settle_abort(
        &mut self,
        account: Address,
        height: U256,
    ) -> Result<U256, Error> {
        let phase = self.phase_at(height);
        if phase != Phase::Escaped {
            return Err(Error::InvalidPhase(SaleInvalidPhase {
                phase: phase as u8,
            }));
        }

        let amount = self._contributions.get(account);
        if amount.is_zero() {
            return Err(Error::NothingToSettle(SaleNothingToSettle {
                account,
            }));
        }

        self._contributions.setter(account).set(U256::ZERO);
        self._wei_remaining.set(self._wei_remaining.get() - amount);

        evm::log(Aborted { contributor: account, amount });

        Ok(amount)
    }

    /// Checks that the sale is past the point of accepting contributions,
    /// so its remaining balances can be swept.
    fn _require_settleable(&self, height: U256) -> Result<(), Error> {
        let phase = self.phase_at(height);
        match phase {
            Phase::Ended | Phase::Escaped | Phase::Closed => Ok(()),
            phase => Err(Error::InvalidPhase(SaleInvalidPhase {
                phase: phase as u8,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, uint, Address, U256};
    use stylus_sdk::msg;

    use super::{Error, Phase, Sale};

    const ALICE: Address = address!("A11CEacF9aa32246d767FCCD72e02d6bCbcC375d");
    const BOB: Address = address!("B0B0cB49ec2e96DF5F5fFB081acaE66A2cBBc2e2");
    const GRID: Address = address!("dCE82b5f92C98F27F116F70491a487EFFDb6a2a9");

    const START: u64 = 100;
    const LENGTH: u64 = 15;
    const Y_INT_DENOM: u64 = 5;
    const M_DENOM: u64 = 100;
    const RMAX: u64 = 960;

    fn cap() -> U256 {
        // 0.5 ether.
        uint!(500_000_000_000_000_000_U256)
    }

    fn construct(contract: &mut Sale) {
        contract.constructor(GRID).expect("should construct");
    }

    fn configure(contract: &mut Sale) {
        construct(contract);
        contract
            .setup_sale(
                U256::from(START),
                U256::from(LENGTH),
                U256::from(Y_INT_DENOM),
                U256::from(M_DENOM),
            )
            .expect("should set up the sale");
        contract.set_cap(cap(), U256::from(RMAX)).expect("should set cap");
    }

    fn at(offset: u64) -> U256 {
        U256::from(START + offset)
    }

    #[motsu::test]
    fn constructs(contract: Sale) {
        construct(contract);
        assert_eq!(GRID, contract.grid());
        assert_eq!(msg::sender(), contract.admin());
        assert_eq!(Phase::Unconfigured, contract.stored_phase());
    }

    #[motsu::test]
    #[should_panic = "Sale has already been initialized"]
    fn constructs_only_once(contract: Sale) {
        construct(contract);
        construct(contract);
    }

    #[motsu::test]
    fn constructor_rejects_zero_token(contract: Sale) {
        let result = contract.constructor(Address::ZERO);
        assert!(matches!(result, Err(Error::InvalidToken(_))));
    }

    #[motsu::test]
    fn setup_rejects_non_admin(contract: Sale) {
        construct(contract);
        contract.admin._switch_admin(BOB);

        let result = contract.setup_sale(
            U256::from(START),
            U256::from(LENGTH),
            U256::from(Y_INT_DENOM),
            U256::from(M_DENOM),
        );
        assert!(matches!(result, Err(Error::UnauthorizedAccount(_))));
    }

    #[motsu::test]
    fn setup_is_single_shot(contract: Sale) {
        construct(contract);
        contract
            .setup_sale(
                U256::from(START),
                U256::from(LENGTH),
                U256::from(Y_INT_DENOM),
                U256::from(M_DENOM),
            )
            .unwrap();

        let result = contract.setup_sale(
            U256::from(START * 2),
            U256::from(LENGTH),
            U256::from(Y_INT_DENOM),
            U256::from(M_DENOM),
        );
        assert!(matches!(result, Err(Error::AlreadyConfigured(_))));

        // The first configuration is untouched.
        assert_eq!(U256::from(START), contract.start());
        assert_eq!(U256::from(START + LENGTH), contract.end());
    }

    #[motsu::test]
    fn setup_rejects_zero_parameters(contract: Sale) {
        construct(contract);

        let result = contract.setup_sale(
            U256::from(START),
            U256::ZERO,
            U256::from(Y_INT_DENOM),
            U256::from(M_DENOM),
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        let result = contract.setup_sale(
            U256::from(START),
            U256::from(LENGTH),
            U256::ZERO,
            U256::from(M_DENOM),
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        let result = contract.setup_sale(
            U256::from(START),
            U256::from(LENGTH),
            U256::from(Y_INT_DENOM),
            U256::ZERO,
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[motsu::test]
    fn set_cap_requires_configuration(contract: Sale) {
        construct(contract);
        let result = contract.set_cap(cap(), U256::from(RMAX));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[motsu::test]
    fn set_cap_is_single_shot(contract: Sale) {
        configure(contract);
        let result = contract.set_cap(cap(), U256::from(RMAX));
        assert!(matches!(result, Err(Error::AlreadyConfigured(_))));
    }

    #[motsu::test]
    fn set_cap_rejects_zero_values(contract: Sale) {
        construct(contract);
        contract
            .setup_sale(
                U256::from(START),
                U256::from(LENGTH),
                U256::from(Y_INT_DENOM),
                U256::from(M_DENOM),
            )
            .unwrap();

        let result = contract.set_cap(U256::ZERO, U256::from(RMAX));
        assert!(matches!(result, Err(Error::InvalidCap(_))));

        let result = contract.set_cap(cap(), U256::ZERO);
        assert!(matches!(result, Err(Error::InvalidCap(_))));
    }

    #[motsu::test]
    fn derives_phases_from_height(contract: Sale) {
        configure(contract);

        assert_eq!(Phase::CapSet, contract.phase_at(U256::from(START - 1)));
        assert_eq!(Phase::Open, contract.phase_at(at(0)));
        assert_eq!(Phase::Open, contract.phase_at(at(LENGTH - 1)));
        assert_eq!(Phase::Closed, contract.phase_at(at(LENGTH)));

        // With an outstanding stake the sale ends instead of closing.
        contract
            ._contribute(ALICE, U256::from(1_000), at(3))
            .unwrap();
        assert_eq!(Phase::Ended, contract.phase_at(at(LENGTH)));
    }

    #[motsu::test]
    fn accepts_contributions_in_window(contract: Sale) {
        configure(contract);

        let amount = U256::from(9_000_000_000_000_000_u64);
        contract._contribute(ALICE, amount, at(0)).unwrap();
        contract._contribute(ALICE, amount, at(5)).unwrap();
        contract._contribute(BOB, amount, at(7)).unwrap();

        assert_eq!(amount + amount, contract.contribution(ALICE));
        assert_eq!(amount, contract.contribution(BOB));
        assert_eq!(amount * U256::from(3), contract.wei_remaining());
        assert_eq!(at(7), contract._last_contribution_block.get());
    }

    #[motsu::test]
    fn rejects_zero_contribution(contract: Sale) {
        configure(contract);
        let result = contract._contribute(ALICE, U256::ZERO, at(0));
        assert!(matches!(result, Err(Error::ZeroContribution(_))));
    }

    #[motsu::test]
    fn rejects_contribution_before_configuration(contract: Sale) {
        construct(contract);
        let result = contract._contribute(ALICE, U256::from(1), at(0));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[motsu::test]
    fn rejects_contribution_at_and_after_end(contract: Sale) {
        configure(contract);
        contract._contribute(ALICE, U256::from(1), at(0)).unwrap();

        let result = contract._contribute(ALICE, U256::from(1), at(LENGTH));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));

        let result =
            contract._contribute(ALICE, U256::from(1), at(LENGTH + 10));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[motsu::test]
    fn gates_presale_contributions(contract: Sale) {
        configure(contract);

        let amount = U256::from(1_000);
        let result = contract._contribute(ALICE, amount, U256::from(START - 1));
        assert!(matches!(result, Err(Error::NotPresaler(_))));

        contract
            ._whitelist_presale(ALICE, U256::from(START - 2))
            .unwrap();
        contract
            ._contribute(ALICE, amount, U256::from(START - 1))
            .unwrap();

        assert_eq!(amount, contract.contribution(ALICE));
        assert_eq!(amount, contract.wei_remaining());
    }

    #[motsu::test]
    fn enforces_the_cap(contract: Sale) {
        configure(contract);

        contract._contribute(ALICE, cap(), at(0)).unwrap();

        let result = contract._contribute(BOB, U256::from(1), at(1));
        assert!(matches!(result, Err(Error::CapExceeded(_))));

        // Nothing was recorded for the rejected contribution.
        assert_eq!(U256::ZERO, contract.contribution(BOB));
        assert_eq!(cap(), contract.wei_remaining());
        assert_eq!(at(0), contract._last_contribution_block.get());
    }

    #[motsu::test]
    fn prices_from_last_contribution(contract: Sale) {
        configure(contract);

        contract._contribute(ALICE, U256::from(1_000), at(0)).unwrap();
        // 960 / 5 + 0 * 960 / 100
        assert_eq!(U256::from(192), contract.final_price());

        contract._contribute(BOB, U256::from(1_000), at(10)).unwrap();
        // 960 / 5 + 10 * 960 / 100
        assert_eq!(U256::from(192 + 96), contract.final_price());
    }

    #[motsu::test]
    fn presale_only_sale_prices_at_intercept(contract: Sale) {
        configure(contract);

        contract
            ._whitelist_presale(ALICE, U256::from(START - 5))
            .unwrap();
        contract
            ._contribute(ALICE, U256::from(1_000), U256::from(START - 3))
            .unwrap();

        assert_eq!(U256::from(192), contract.final_price());
    }

    #[motsu::test]
    fn price_is_zero_before_cap(contract: Sale) {
        construct(contract);
        assert_eq!(U256::ZERO, contract.final_price());
    }

    #[motsu::test]
    fn settles_withdrawals_once(contract: Sale) {
        configure(contract);

        let amount = U256::from(1_000);
        contract._contribute(ALICE, amount, at(10)).unwrap();

        // 192 + 96 at height `start + 10`.
        let price = U256::from(288);
        assert_eq!(amount * price, contract.reward_of(ALICE));

        let reward = contract._settle_withdraw(ALICE, at(LENGTH)).unwrap();
        assert_eq!(amount * price, reward);
        assert_eq!(U256::ZERO, contract.contribution(ALICE));
        assert_eq!(U256::ZERO, contract.wei_remaining());

        let result = contract._settle_withdraw(ALICE, at(LENGTH));
        // Nothing outstanding, so the sale is closed.
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[motsu::test]
    fn withdraw_replay_fails_while_others_are_unsettled(contract: Sale) {
        configure(contract);

        let amount = U256::from(1_000);
        contract._contribute(ALICE, amount, at(0)).unwrap();
        contract._contribute(BOB, amount, at(1)).unwrap();

        contract._settle_withdraw(ALICE, at(LENGTH)).unwrap();
        let result = contract._settle_withdraw(ALICE, at(LENGTH));
        assert!(matches!(result, Err(Error::NothingToSettle(_))));

        // Bob's stake is untouched.
        assert_eq!(amount, contract.contribution(BOB));
    }

    #[motsu::test]
    fn rejects_withdrawal_while_open(contract: Sale) {
        configure(contract);
        contract._contribute(ALICE, U256::from(1_000), at(0)).unwrap();

        let result = contract._settle_withdraw(ALICE, at(1));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[motsu::test]
    fn pays_presale_bonus(contract: Sale) {
        configure(contract);

        let amount = U256::from(1_000);
        contract
            ._whitelist_presale(ALICE, U256::from(START - 5))
            .unwrap();
        contract
            ._contribute(ALICE, amount, U256::from(START - 1))
            .unwrap();
        contract._contribute(BOB, amount, at(0)).unwrap();

        // Base price is the intercept, 192.
        let base = amount * U256::from(192);
        assert_eq!(base, contract.reward_of(BOB));
        assert_eq!(
            base * U256::from(115) / U256::from(100),
            contract.reward_of(ALICE)
        );
    }

    #[motsu::test]
    fn escape_freezes_contributions(contract: Sale) {
        configure(contract);
        contract._contribute(ALICE, U256::from(1_000), at(0)).unwrap();

        contract._escape(at(1)).unwrap();
        assert_eq!(Phase::Escaped, contract.phase_at(at(2)));

        let result = contract._contribute(BOB, U256::from(1), at(2));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));

        // Rewards are no longer withdrawable, even past the end.
        let result = contract._settle_withdraw(ALICE, at(LENGTH));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[motsu::test]
    fn escape_rejected_after_end(contract: Sale) {
        configure(contract);
        contract._contribute(ALICE, U256::from(1_000), at(0)).unwrap();

        let result = contract._escape(at(LENGTH));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[motsu::test]
    fn aborts_refund_exactly_once(contract: Sale) {
        configure(contract);

        let amount = U256::from(1_000);
        contract._contribute(ALICE, amount, at(0)).unwrap();
        contract._contribute(BOB, amount, at(1)).unwrap();
        contract._escape(at(2)).unwrap();

        let refunded = contract._settle_abort(ALICE, at(3)).unwrap();
        assert_eq!(amount, refunded);
        assert_eq!(U256::ZERO, contract.contribution(ALICE));
        assert_eq!(amount, contract.wei_remaining());

        let result = contract._settle_abort(ALICE, at(3));
        assert!(matches!(result, Err(Error::NothingToSettle(_))));
    }

    #[motsu::test]
    fn abort_requires_escape(contract: Sale) {
        configure(contract);
        contract._contribute(ALICE, U256::from(1_000), at(0)).unwrap();

        let result = contract._settle_abort(ALICE, at(LENGTH));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[motsu::test]
    fn vent_refunds_and_removes_presaler(contract: Sale) {
        configure(contract);

        let amount = U256::from(1_000);
        contract
            ._whitelist_presale(ALICE, U256::from(START - 5))
            .unwrap();
        contract
            ._contribute(ALICE, amount, U256::from(START - 3))
            .unwrap();

        let refunded =
            contract._vent_presale(ALICE, U256::from(START - 1)).unwrap();
        assert_eq!(amount, refunded);
        assert!(!contract.is_presaler(ALICE));
        assert_eq!(U256::ZERO, contract.contribution(ALICE));
        assert_eq!(U256::ZERO, contract.wei_remaining());
    }

    #[motsu::test]
    fn vent_rejects_non_presaler(contract: Sale) {
        configure(contract);
        let result = contract._vent_presale(ALICE, U256::from(START - 1));
        assert!(matches!(result, Err(Error::NotPresaler(_))));
    }

    #[motsu::test]
    fn vent_rejected_once_open(contract: Sale) {
        configure(contract);
        contract
            ._whitelist_presale(ALICE, U256::from(START - 5))
            .unwrap();

        let result = contract._vent_presale(ALICE, at(0));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[motsu::test]
    fn sweeps_only_after_the_sale(contract: Sale) {
        configure(contract);
        contract._contribute(ALICE, U256::from(1_000), at(0)).unwrap();

        let result = contract._require_settleable(at(1));
        assert!(matches!(result, Err(Error::InvalidPhase(_))));

        assert!(contract._require_settleable(at(LENGTH)).is_ok());

        contract._escape(at(1)).unwrap();
        assert!(contract._require_settleable(at(2)).is_ok());
    }

    #[motsu::test]
    fn switches_admin(contract: Sale) {
        construct(contract);
        contract.switch_admin(BOB).unwrap();
        assert_eq!(BOB, contract.admin());

        let result = contract.switch_admin(ALICE);
        assert!(matches!(result, Err(Error::UnauthorizedAccount(_))));
    }
}
