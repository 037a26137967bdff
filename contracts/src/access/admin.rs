//! Contract module which provides a basic access control mechanism, where
//! there is an account (an admin) that can be granted exclusive access to
//! specific functions.
//!
//! The admin is set once, by the embedding contract's constructor, and can
//! later be handed over with [`Admin::switch_admin`].
//!
//! This module is used through embedding. It will make available the
//! [`Admin::only_admin`] function, which can be called to restrict operations
//! to the admin.
use alloy_primitives::Address;
use alloy_sol_types::sol;
use stylus_sdk::{
    call::MethodError,
    evm, msg,
    stylus_proc::{public, sol_storage, SolidityError},
};

sol! {
    /// Emitted when the admin role moves between accounts.
    ///
    /// * `previous_admin` - Address of the previous admin.
    /// * `new_admin` - Address of the new admin.
    #[allow(missing_docs)]
    event AdminSwitched(address indexed previous_admin, address indexed new_admin);
}

sol! {
    /// The caller account is not authorized to perform an operation.
    ///
    /// * `account` - Account that was found to not be authorized.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error AdminUnauthorizedAccount(address account);
    /// The account is not a valid admin account. (eg. [`Address::ZERO`])
    ///
    /// * `admin` - Account that's not allowed to become the admin.
    #[derive(Debug)]
    #[allow(missing_docs)]
    error AdminInvalidAccount(address admin);
}

/// An error that occurred in the [`Admin`] contract.
#[derive(SolidityError, Debug)]
pub enum Error {
    /// The caller account is not authorized to perform an operation.
    UnauthorizedAccount(AdminUnauthorizedAccount),
    /// The account is not a valid admin account.
    InvalidAccount(AdminInvalidAccount),
}

impl MethodError for Error {
    fn encode(self) -> alloc::vec::Vec<u8> {
        self.into()
    }
}

sol_storage! {
    /// State of an [`Admin`] contract.
    pub struct Admin {
        /// The account allowed to perform privileged operations.
        address _admin;
    }
}

#[public]
impl Admin {
    /// Returns the address of the current admin.
    pub fn admin(&self) -> Address {
        self._admin.get()
    }

    /// Hands the admin role over to `new_admin`. Can only be called by the
    /// current admin.
    ///
    /// # Arguments
    ///
    /// * `&mut self` - Write access to the contract's state.
    /// * `new_admin` - The next admin of this contract.
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    /// If `new_admin` is the [`Address::ZERO`], then the error
    /// [`Error::InvalidAccount`] is returned.
    ///
    /// # Events
    ///
    /// Emits an [`AdminSwitched`] event.
    pub fn switch_admin(&mut self, new_admin: Address) -> Result<(), Error> {
        self.only_admin()?;

        if new_admin.is_zero() {
            return Err(Error::InvalidAccount(AdminInvalidAccount {
                admin: Address::ZERO,
            }));
        }

        self._switch_admin(new_admin);

        Ok(())
    }
}

impl Admin {
    /// Checks if the [`msg::sender`] is set as the admin.
    ///
    /// # Errors
    ///
    /// If called by any account other than the admin, then the error
    /// [`Error::UnauthorizedAccount`] is returned.
    pub fn only_admin(&self) -> Result<(), Error> {
        let account = msg::sender();
        if self.admin() != account {
            return Err(Error::UnauthorizedAccount(AdminUnauthorizedAccount {
                account,
            }));
        }

        Ok(())
    }

    /// Hands the admin role over to `new_admin`. Internal function without
    /// access restriction.
    ///
    /// # Events
    ///
    /// Emits an [`AdminSwitched`] event.
    pub fn _switch_admin(&mut self, new_admin: Address) {
        let previous_admin = self._admin.get();
        self._admin.set(new_admin);
        evm::log(AdminSwitched { previous_admin, new_admin });
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, Address};
    use stylus_sdk::msg;

    use super::{Admin, AdminInvalidAccount, AdminUnauthorizedAccount, Error};

    const BOB: Address = address!("F4EaCDAbEf3c8f1EdE91b6f2A6840bc2E4DD3b01");

    #[motsu::test]
    fn reads_admin(contract: Admin) {
        let alice = msg::sender();
        contract._admin.set(alice);
        assert_eq!(alice, contract.admin());
    }

    #[motsu::test]
    fn switches_admin(contract: Admin) {
        let alice = msg::sender();
        contract._admin.set(alice);

        let result = contract.switch_admin(BOB);
        assert!(result.is_ok());
        assert_eq!(BOB, contract.admin());
    }

    #[motsu::test]
    fn prevents_non_admins_from_switching(contract: Admin) {
        let alice = msg::sender();
        contract._admin.set(BOB);

        let err = contract.switch_admin(alice).unwrap_err();
        assert!(matches!(
            err,
            Error::UnauthorizedAccount(AdminUnauthorizedAccount { account })
                if account == alice
        ));
    }

    #[motsu::test]
    fn rejects_zero_address_admin(contract: Admin) {
        let alice = msg::sender();
        contract._admin.set(alice);

        let err = contract.switch_admin(Address::ZERO).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidAccount(AdminInvalidAccount { admin })
                if admin.is_zero()
        ));
    }

    #[motsu::test]
    fn internal_switch_skips_authorization(contract: Admin) {
        contract._switch_admin(BOB);
        assert_eq!(BOB, contract.admin());
    }
}
