//! Primitives for financial systems.
pub mod pricing;
pub mod sale;

pub use sale::Sale;
