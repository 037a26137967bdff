/*!
# GRID Contracts for Stylus

Contracts for the GRID token and its block-height driven sale, written in
Rust for [Arbitrum Stylus](https://docs.arbitrum.io/stylus/stylus-gentle-introduction).

The library ships two deployable components and the pieces they are built
from:

- [`token::grid::Grid`] - a fungible token with signature-authorized
  redemption.
- [`finance::sale::Sale`] - a linear-price sale that custodies native
  currency and pays out GRID once the sale window closes.

```ignore
use grid_sale_stylus::token::grid::Grid;

sol_storage! {
    #[entrypoint]
    struct GridToken {
        #[borrow]
        Grid grid;
    }
}

#[public]
#[inherit(Grid)]
impl GridToken {}
```
*/

#![allow(clippy::pub_underscore_fields, clippy::module_name_repetitions)]
#![cfg_attr(not(any(test, feature = "std")), no_std, no_main)]
#![deny(rustdoc::broken_intra_doc_links)]
extern crate alloc;

#[cfg(target_arch = "wasm32")]
#[global_allocator]
static ALLOC: mini_alloc::MiniAlloc = mini_alloc::MiniAlloc::INIT;

pub mod access;
pub mod finance;
pub mod token;
pub mod utils;

#[cfg(all(target_arch = "wasm32", not(feature = "export-abi")))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
