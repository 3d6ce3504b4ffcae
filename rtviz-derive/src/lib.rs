//! Derive macros for rtviz.
//!
//! This crate provides:
//! - [`ParticleClass`] - Creates type-safe enums for scene particle classes
//!
//! # Usage
//!
//! The macro is re-exported from the main `rtviz` crate. You don't need
//! to add this crate directly:
//!
//! ```ignore
//! use rtviz::prelude::*;
//!
//! #[derive(ParticleClass, Clone, Copy, PartialEq, Debug)]
//! enum Compartment {
//!     #[class(rename = "S")]
//!     Susceptible,
//!     #[class(rename = "I")]
//!     Infected,
//!     #[class(rename = "R")]
//!     Recovered,
//! }
//! ```
//!
//! # The ParticleClass Macro
//!
//! `#[derive(ParticleClass)]` ties an enum to the class names a model emits
//! in `scene.particle_targets`. It generates:
//! - `impl rtviz::model::ParticleClass` - `NAMES`, `index()`, `from_index()`
//! - `From<EnumName> for u32` - Variant to class index
//! - `From<u32> for EnumName` - Back again (defaults to first variant)
//! - `EnumName::count() -> usize` - Number of variants

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr, Variant};

/// Class name for one variant: `#[class(rename = "...")]` or the variant
/// identifier.
fn class_name(variant: &Variant) -> syn::Result<String> {
    let mut name = variant.ident.to_string();
    for attr in variant.attrs.iter().filter(|a| a.path().is_ident("class")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                name = lit.value();
                Ok(())
            } else {
                Err(meta.error("unsupported class attribute, expected `rename`"))
            }
        })?;
    }
    Ok(name)
}

/// Derive macro for particle class enums.
///
/// Variants are assigned sequential indices starting from 0, in declaration
/// order. That order is also the relabelling order of the scene renderer.
///
/// # Generated Items
///
/// For an enum `Compartment`:
///
/// - `impl ParticleClass for Compartment`
/// - `impl From<Compartment> for u32` - Convert variant to index
/// - `impl From<u32> for Compartment` - Convert index to variant (invalid values default to first variant)
/// - `Compartment::count() -> usize` - Returns number of variants
///
/// # Requirements
///
/// - Must be an enum (not a struct)
/// - All variants must be unit variants (no fields)
/// - Enum must also derive `Clone` and `Copy`
///
/// # Example
///
/// ```ignore
/// #[derive(ParticleClass, Clone, Copy, PartialEq)]
/// enum Phase {
///     Liquid,                     // = 0, "Liquid"
///     #[class(rename = "vapour")]
///     Vapour,                     // = 1, "vapour"
/// }
///
/// let decl = ModelDeclaration::new().classes_of::<Phase>();
/// let snap = Snapshot::empty().with_target(Phase::Vapour.name(), 40);
/// assert_eq!(Phase::count(), 2);
/// ```
///
/// # Errors
///
/// Compilation fails if:
/// - Applied to a struct or union instead of an enum
/// - Any variant has fields (tuple or struct variants)
/// - Enum has zero variants
/// - Two variants resolve to the same class name
#[proc_macro_derive(ParticleClass, attributes(class))]
pub fn derive_particle_class(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    let variants = match &input.data {
        Data::Enum(data) => &data.variants,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "ParticleClass derive only supports enums",
            ))
        }
    };

    // Check that all variants are unit variants (no fields)
    for variant in variants.iter() {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                format!(
                    "ParticleClass enum variants must be unit variants (no fields). \
                     Found fields on variant '{}'",
                    variant.ident
                ),
            ));
        }
    }

    let first_variant = match variants.first() {
        Some(v) => &v.ident,
        None => {
            return Err(syn::Error::new_spanned(
                name,
                "ParticleClass enum must have at least one variant",
            ))
        }
    };

    let mut names = Vec::with_capacity(variants.len());
    for variant in variants.iter() {
        let class = class_name(variant)?;
        if names.contains(&class) {
            return Err(syn::Error::new_spanned(
                variant,
                format!("duplicate particle class name '{}'", class),
            ));
        }
        names.push(class);
    }

    let idents: Vec<_> = variants.iter().map(|v| &v.ident).collect();
    let indices: Vec<usize> = (0..idents.len()).collect();
    let indices_u32: Vec<u32> = (0..idents.len() as u32).collect();
    let variant_count = idents.len();

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::rtviz::model::ParticleClass for #name #ty_generics #where_clause {
            const NAMES: &'static [&'static str] = &[#(#names),*];

            fn index(self) -> usize {
                match self {
                    #(#name::#idents => #indices),*
                }
            }

            fn from_index(index: usize) -> ::core::option::Option<Self> {
                match index {
                    #(#indices => ::core::option::Option::Some(#name::#idents),)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl From<#name> for u32 {
            fn from(value: #name) -> u32 {
                match value {
                    #(#name::#idents => #indices_u32),*
                }
            }
        }

        impl From<u32> for #name {
            fn from(value: u32) -> #name {
                match value {
                    #(#indices_u32 => #name::#idents,)*
                    _ => #name::#first_variant, // Default to first variant for invalid values
                }
            }
        }

        impl #name {
            /// Returns the number of variants in this particle class enum.
            pub const fn count() -> usize {
                #variant_count
            }
        }
    })
}
