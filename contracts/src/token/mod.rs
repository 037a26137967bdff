//! Token implementations.
pub mod grid;

pub use grid::Grid;
