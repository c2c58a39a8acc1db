//! Derive macros for Shopkeep
//!
//! Stores receive two kinds of actions: commands sent by the caller, and
//! settlements fed back by effects once a repository call finished. This
//! crate classifies action enums so stores and the view layer can tell them
//! apart without hand-written matches.
//!
//! # Available Macros
//!
//! - `#[derive(Action)]` - Generates classification helpers for action enums
//!
//! # Example
//!
//! ```ignore
//! use shopkeep_macros::Action;
//!
//! #[derive(Action, Clone, Debug)]
//! #[action(slice = "cart")]
//! enum CartAction {
//!     #[command]
//!     FetchAll,
//!
//!     #[fulfilled]
//!     ItemsLoaded { items: Vec<CartItem> },
//!
//!     #[rejected]
//!     Failed { error: String },
//! }
//!
//! assert!(CartAction::FetchAll.is_command());
//! assert_eq!(CartAction::FetchAll.action_type(), "cart/FetchAll");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr, Variant};

/// Derive macro for Action enums
///
/// Generates helper methods for action enums:
/// - `is_command()` - Returns true if this variant is caller intent
/// - `is_fulfilled()` - Returns true if this variant settles a successful request
/// - `is_rejected()` - Returns true if this variant settles a failed request
/// - `is_settlement()` - Fulfilled or rejected
/// - `action_type()` - `"<slice>/<Variant>"`, used in logs
///
/// # Attributes
///
/// - `#[action(slice = "...")]` on the enum - Prefix for `action_type()`.
///   Defaults to the enum name.
/// - `#[command]`, `#[fulfilled]`, `#[rejected]` on variants. Variants
///   without a marker are local-only and none of the predicates match them.
///
/// # Errors
///
/// Produces a compile error if:
/// - Applied to a non-enum type
/// - A variant carries more than one marker
/// - The `action` attribute is malformed
#[proc_macro_derive(Action, attributes(action, command, fulfilled, rejected))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_action(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_action(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Action)] can only be used on enums",
        ));
    };

    let slice = slice_name(&input.attrs)?.unwrap_or_else(|| name.to_string());

    let mut command_arms = Vec::new();
    let mut fulfilled_arms = Vec::new();
    let mut rejected_arms = Vec::new();
    let mut type_arms = Vec::new();

    for variant in &data_enum.variants {
        let markers = ["command", "fulfilled", "rejected"]
            .into_iter()
            .filter(|marker| has_attribute(&variant.attrs, marker))
            .collect::<Vec<_>>();

        if markers.len() > 1 {
            return Err(syn::Error::new_spanned(
                variant,
                "Variant can carry only one of #[command], #[fulfilled], #[rejected]",
            ));
        }

        let pattern = variant_pattern(variant);
        match markers.first() {
            Some(&"command") => command_arms.push(quote! { #pattern => true, }),
            Some(&"fulfilled") => fulfilled_arms.push(quote! { #pattern => true, }),
            Some(&"rejected") => rejected_arms.push(quote! { #pattern => true, }),
            _ => {},
        }

        let type_name = format!("{slice}/{}", variant.ident);
        type_arms.push(quote! { #pattern => #type_name, });
    }

    Ok(quote! {
        impl #name {
            /// Returns true if this action is a caller command
            #[must_use]
            #[allow(unreachable_patterns)]
            pub const fn is_command(&self) -> bool {
                match self {
                    #(#command_arms)*
                    _ => false,
                }
            }

            /// Returns true if this action settles a successful request
            #[must_use]
            #[allow(unreachable_patterns)]
            pub const fn is_fulfilled(&self) -> bool {
                match self {
                    #(#fulfilled_arms)*
                    _ => false,
                }
            }

            /// Returns true if this action settles a failed request
            #[must_use]
            #[allow(unreachable_patterns)]
            pub const fn is_rejected(&self) -> bool {
                match self {
                    #(#rejected_arms)*
                    _ => false,
                }
            }

            /// Returns true if this action settles a request either way
            #[must_use]
            pub const fn is_settlement(&self) -> bool {
                self.is_fulfilled() || self.is_rejected()
            }

            /// Returns the action type name, `"<slice>/<Variant>"`
            #[must_use]
            pub const fn action_type(&self) -> &'static str {
                match self {
                    #(#type_arms)*
                }
            }
        }
    })
}

/// Match pattern for a variant regardless of its field shape
fn variant_pattern(variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    match variant.fields {
        Fields::Named(_) => quote! { Self::#ident { .. } },
        Fields::Unnamed(_) => quote! { Self::#ident(..) },
        Fields::Unit => quote! { Self::#ident },
    }
}

/// Reads `#[action(slice = "...")]` from the enum attributes
fn slice_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut slice = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("action")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("slice") {
                let value: LitStr = meta.value()?.parse()?;
                slice = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported action attribute, expected `slice`"))
            }
        })?;
    }
    Ok(slice)
}

/// Helper function to check if an attribute list contains a specific attribute
fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}
