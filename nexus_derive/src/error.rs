//! `#[derive(Error)]` for error enums and structs.
//!
//! ```ignore
//! use nexus_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum StoreError {
//!     #[error("missing key {0}")]
//!     Missing(String),
//!     #[error("expected {expected} bytes, got {actual}")]
//!     Length { expected: usize, actual: usize },
//!     #[error("decode failed: {0}")]
//!     Decode(#[from] DecodeError),
//! }
//! ```
//!
//! Fields are interpolated by position (`{0}`) or by name (`{field}`), with
//! optional format specs (`{0:?}`). Fields the message does not mention are
//! not bound. A single-field tuple variant whose field carries `#[from]` also
//! gets a `From<FieldType>` impl.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, LitStr};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (display_body, from_impls) = match &input.data {
        Data::Enum(data) => {
            let mut arms = Vec::with_capacity(data.variants.len());
            let mut froms = Vec::new();
            for variant in &data.variants {
                let message = message_of(&variant.attrs, &variant.ident)?;
                let ident = &variant.ident;
                arms.push(display_arm(ident, &variant.fields, &message));
                if let Some(from) = from_impl(name, ident, &variant.fields)? {
                    froms.push(from);
                }
            }
            (quote! { match self { #(#arms)* } }, froms)
        }
        Data::Struct(data) => {
            let message = message_of(&input.attrs, &input.ident)?;
            (struct_display(&data.fields, &message), Vec::new())
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #display_body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}

        #(#from_impls)*
    })
}

/// Reads the string literal of `#[error("...")]`.
fn message_of(attrs: &[Attribute], target: &Ident) -> syn::Result<String> {
    let attr = attrs
        .iter()
        .find(|a| a.path().is_ident("error"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                target,
                format!("`{target}` needs an #[error(\"...\")] attribute with its display message"),
            )
        })?;
    let lit: LitStr = attr.parse_args().map_err(|_| {
        syn::Error::new_spanned(
            &attr.meta,
            "#[error] takes a single string literal, e.g. #[error(\"unknown interop: {0}\")]",
        )
    })?;
    Ok(lit.value())
}

/// True when the message interpolates `{key}` or `{key:spec}`.
fn mentions(message: &str, key: &str) -> bool {
    message.contains(&format!("{{{key}}}")) || message.contains(&format!("{{{key}:"))
}

/// Rewrites `{0}` / `{0:?}` into `{f0}` / `{f0:?}` so positional fields can
/// be passed as named format arguments.
fn positional_to_named(message: &str, count: usize) -> String {
    let mut out = message.to_string();
    for i in (0..count).rev() {
        out = out
            .replace(&format!("{{{i}}}"), &format!("{{f{i}}}"))
            .replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    out
}

fn display_arm(variant: &Ident, fields: &Fields, message: &str) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! { Self::#variant => write!(f, #message), },
        Fields::Unnamed(unnamed) => {
            let count = unnamed.unnamed.len();
            let message = positional_to_named(message, count);
            let mut binds = Vec::with_capacity(count);
            let mut args = Vec::new();
            for i in 0..count {
                let key = format!("f{i}");
                if mentions(&message, &key) {
                    let ident = format_ident!("f{}", i);
                    binds.push(quote! { #ident });
                    args.push(quote! { #ident = #ident });
                } else {
                    binds.push(quote! { _ });
                }
            }
            quote! { Self::#variant(#(#binds),*) => write!(f, #message #(, #args)*), }
        }
        Fields::Named(named) => {
            let used: Vec<&Ident> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| mentions(message, &ident.to_string()))
                .collect();
            quote! {
                Self::#variant { #(#used,)* .. } => write!(f, #message #(, #used = #used)*),
            }
        }
    }
}

fn struct_display(fields: &Fields, message: &str) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! { write!(f, #message) },
        Fields::Named(named) => {
            let used: Vec<&Ident> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| mentions(message, &ident.to_string()))
                .collect();
            quote! { write!(f, #message #(, #used = self.#used)*) }
        }
        Fields::Unnamed(unnamed) => {
            let message = positional_to_named(message, unnamed.unnamed.len());
            let args = (0..unnamed.unnamed.len())
                .filter(|i| mentions(&message, &format!("f{i}")))
                .map(|i| {
                    let ident = format_ident!("f{}", i);
                    let index = syn::Index::from(i);
                    quote! { #ident = self.#index }
                });
            quote! { write!(f, #message #(, #args)*) }
        }
    }
}

/// `impl From<T> for Enum` for `Variant(#[from] T)`.
fn from_impl(enum_name: &Ident, variant: &Ident, fields: &Fields) -> syn::Result<Option<TokenStream2>> {
    let Fields::Unnamed(unnamed) = fields else {
        return Ok(None);
    };
    let tagged = unnamed
        .unnamed
        .iter()
        .any(|field| field.attrs.iter().any(|a| a.path().is_ident("from")));
    if !tagged {
        return Ok(None);
    }
    if unnamed.unnamed.len() != 1 {
        return Err(syn::Error::new_spanned(
            variant,
            "#[from] is only supported on single-field tuple variants",
        ));
    }
    let ty = &unnamed.unnamed[0].ty;
    Ok(Some(quote! {
        impl ::std::convert::From<#ty> for #enum_name {
            fn from(source: #ty) -> Self {
                Self::#variant(source)
            }
        }
    }))
}
