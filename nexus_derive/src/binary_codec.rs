//! `#[derive(BinaryCodec)]`: field-order binary serialization.
//!
//! Generates `crate::types::encoding::{Encode, Decode}` for structs (named,
//! tuple, unit) and enums. The wire layout follows the engine codec:
//! fields in declaration order, enums prefixed with a one-byte tag that
//! honours explicit discriminants (`Variant = 7`).
//!
//! ```ignore
//! #[derive(BinaryCodec)]
//! pub struct ContractParameter {
//!     pub name: String,
//!     pub kind: VMType,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DataEnum, DeriveInput, Fields};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => {
            let (pattern, encoders) = destructure(&data.fields);
            let decoders = construct(&data.fields);
            (
                quote! {
                    let Self #pattern = self;
                    #(#encoders)*
                },
                quote! { Ok(Self #decoders) },
            )
        }
        Data::Enum(data) => enum_bodies(data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "BinaryCodec derive does not support unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

/// Builds a by-reference destructuring pattern and one encode call per binding.
fn destructure(fields: &Fields) -> (TokenStream2, Vec<TokenStream2>) {
    match fields {
        Fields::Unit => (quote! {}, Vec::new()),
        Fields::Named(named) => {
            let idents: Vec<_> = named.named.iter().filter_map(|f| f.ident.clone()).collect();
            let encoders = idents
                .iter()
                .map(|i| quote! { crate::types::encoding::Encode::encode(#i, out); })
                .collect();
            (quote! { { #(#idents),* } }, encoders)
        }
        Fields::Unnamed(unnamed) => {
            let idents: Vec<_> = (0..unnamed.unnamed.len()).map(|i| format_ident!("f{}", i)).collect();
            let encoders = idents
                .iter()
                .map(|i| quote! { crate::types::encoding::Encode::encode(#i, out); })
                .collect();
            (quote! { ( #(#idents),* ) }, encoders)
        }
    }
}

/// Builds the constructor tail (`{ a: decode?, .. }`, `(decode?, ..)` or nothing).
fn construct(fields: &Fields) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! {},
        Fields::Named(named) => {
            let inits = named.named.iter().map(|f| {
                let ident = &f.ident;
                quote! { #ident: crate::types::encoding::Decode::decode(input)? }
            });
            quote! { { #(#inits),* } }
        }
        Fields::Unnamed(unnamed) => {
            let inits = unnamed
                .unnamed
                .iter()
                .map(|_| quote! { crate::types::encoding::Decode::decode(input)? });
            quote! { ( #(#inits),* ) }
        }
    }
}

fn enum_bodies(data: &DataEnum) -> syn::Result<(TokenStream2, TokenStream2)> {
    let tags = discriminants(data)?;
    let mut encode_arms = Vec::with_capacity(tags.len());
    let mut decode_arms = Vec::with_capacity(tags.len());

    for (variant, tag) in data.variants.iter().zip(tags) {
        let ident = &variant.ident;
        let (pattern, encoders) = destructure(&variant.fields);
        let decoders = construct(&variant.fields);
        encode_arms.push(quote! {
            Self::#ident #pattern => {
                crate::types::encoding::Encode::encode(&#tag, out);
                #(#encoders)*
            }
        });
        decode_arms.push(quote! { #tag => Ok(Self::#ident #decoders), });
    }

    Ok((
        quote! { match self { #(#encode_arms)* } },
        quote! {
            let tag: u8 = crate::types::encoding::Decode::decode(input)?;
            match tag {
                #(#decode_arms)*
                _ => Err(crate::types::encoding::DecodeError::InvalidValue),
            }
        },
    ))
}

/// One-byte tags following Rust's discriminant numbering.
fn discriminants(data: &DataEnum) -> syn::Result<Vec<u8>> {
    let mut tags = Vec::with_capacity(data.variants.len());
    let mut next: u16 = 0;
    for variant in &data.variants {
        let tag = match &variant.discriminant {
            Some((_, expr)) => literal_u8(expr)?,
            None => u8::try_from(next).map_err(|_| {
                syn::Error::new_spanned(&variant.ident, "BinaryCodec enums are limited to 256 variants")
            })?,
        };
        tags.push(tag);
        next = u16::from(tag) + 1;
    }
    Ok(tags)
}

fn literal_u8(expr: &syn::Expr) -> syn::Result<u8> {
    if let syn::Expr::Lit(syn::ExprLit { lit: syn::Lit::Int(int), .. }) = expr {
        return int.base10_parse::<u8>();
    }
    Err(syn::Error::new_spanned(
        expr,
        "BinaryCodec discriminants must be integer literals in 0..=255",
    ))
}
