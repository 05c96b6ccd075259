//! Module containing useful macros for the [courier] crate.
//!
//! [courier]: https://docs.rs/courier

#![deny(unsafe_code, unused_qualifications, trivial_casts)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, LitStr};

/// Implements `courier::message::Message` for a Command or Event type.
///
/// For `enum`s the name of the Message is the identifier of the variant,
/// for `struct`s it is the identifier of the type. Both can be overridden
/// with `#[message(name = "...")]`.
///
/// ```text
/// #[derive(Message)]
/// enum AccountEvent {
///     AccountOpened { id: u64 },
///     #[message(name = "MoneyDeposited")]
///     Deposited { id: u64, amount: u64 },
/// }
/// ```
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let item_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(_) => {
            let name = message_name(&input.attrs)?.unwrap_or_else(|| item_name.to_string());

            quote! { #name }
        }
        Data::Enum(item) => {
            if item.variants.is_empty() {
                return Err(syn::Error::new_spanned(
                    item_name,
                    "Message can't be derived for enums without variants",
                ));
            }

            let mut match_cases = quote! {};

            for variant in &item.variants {
                let variant_ident = &variant.ident;
                let name = message_name(&variant.attrs)?
                    .unwrap_or_else(|| variant_ident.to_string());

                match_cases.extend(quote! {
                    Self::#variant_ident { .. } => #name,
                });
            }

            quote! {
                match self {
                    #match_cases
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                item_name,
                "Message can't be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::courier::message::Message for #item_name #ty_generics #where_clause {
            fn name(&self) -> &'static str {
                #body
            }
        }
    })
}

/// Looks for a `#[message(name = "...")]` override among the attributes.
fn message_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut name = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("message")) {
        attr.parse_nested_meta(|meta| {
            if !meta.path.is_ident("name") {
                return Err(meta.error("unsupported message attribute, expected `name`"));
            }

            let value: LitStr = meta.value()?.parse()?;

            if value.value().is_empty() {
                return Err(syn::Error::new_spanned(
                    &value,
                    "message name must not be empty",
                ));
            }

            name = Some(value.value());

            Ok(())
        })?;
    }

    Ok(name)
}
