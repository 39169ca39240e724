//! Derive macros for the regpack crate.
//!
//! Provides:
//! - `#[derive(Error)]` - error type boilerplate (thiserror replacement) with
//!   `#[from]` conversions and `#[source]` chaining for wrapped error types

mod error;

use proc_macro::TokenStream;

/// Automatically implements `Display`, `Error` and `From` (for `#[from]` fields).
#[proc_macro_derive(Error, attributes(error, from, source))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
