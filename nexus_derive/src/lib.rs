//! Derive macros for the execution engine.
//!
//! - `#[derive(BinaryCodec)]` implements the engine's `Encode`/`Decode` traits
//! - `#[derive(Error)]` implements `Display`, `std::error::Error` and `From`
//!   conversions for `#[from]` fields

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` from `crate::types::encoding`.
#[proc_macro_derive(BinaryCodec, attributes(binary_codec))]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `Error` from `#[error("...")]` attributes.
#[proc_macro_derive(Error, attributes(error, from))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
