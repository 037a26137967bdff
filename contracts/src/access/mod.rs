//! Contracts implementing access control mechanisms.
pub mod admin;

pub use admin::{Admin, Error as AdminError};
