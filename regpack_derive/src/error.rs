//! Derive macro for error types.
//!
//! Generates `std::fmt::Display`, `std::error::Error` and `From`
//! implementations for error enums. Replacement for the `thiserror` crate.
//!
//! # Usage
//!
//! ```ignore
//! use regpack_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum CompileError {
//!     #[error("undefined identifier: {name}")]
//!     UndefinedIdentifier { name: String },
//!
//!     #[error("register error: {0}")]
//!     Register(#[from] RegisterError),
//!
//!     #[error("empty program")]
//!     Empty,
//! }
//! ```
//!
//! # Supported Features
//!
//! - Unit variants: `#[error("message")]`
//! - Tuple variants with positional args: `#[error("error: {0}")]`
//! - Struct variants with named args: `#[error("expected {expected}")]`
//! - `#[from]` on the only field of a tuple variant: generates
//!   `impl From<Field>` and reports the field from `Error::source`
//! - `#[source]` on any one field: reports it from `Error::source` without
//!   generating a conversion

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DataEnum, DeriveInput, Fields, Lit, Meta, parse_macro_input};

/// Derives `Display`, `Error` and `From` for an error enum.
///
/// Each variant must have an `#[error("...")]` attribute specifying
/// the display message. Tuple fields are interpolated as `{0}`, `{1}`,
/// named fields as `{field_name}`; every named field has to appear in the
/// message.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_error_derive(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_error_derive(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    match &input.data {
        Data::Enum(data_enum) => {
            let display_arms = data_enum
                .variants
                .iter()
                .map(|variant| {
                    let variant_name = &variant.ident;
                    let error_msg = extract_error_message(variant)?;

                    let arm = match &variant.fields {
                        Fields::Unit => {
                            quote! {
                                Self::#variant_name => write!(f, #error_msg),
                            }
                        }
                        Fields::Unnamed(fields) => {
                            let field_names: Vec<_> = (0..fields.unnamed.len())
                                .map(|i| quote::format_ident!("f{}", i))
                                .collect();
                            let format_str =
                                convert_positional_to_named(&error_msg, fields.unnamed.len());
                            quote! {
                                Self::#variant_name(#(#field_names),*) => write!(f, #format_str, #(#field_names = #field_names),*),
                            }
                        }
                        Fields::Named(fields) => {
                            let field_names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
                            quote! {
                                Self::#variant_name { #(#field_names),* } => write!(f, #error_msg, #(#field_names = #field_names),*),
                            }
                        }
                    };

                    Ok(arm)
                })
                .collect::<syn::Result<Vec<_>>>()?;

            let source_fields = collect_source_fields(data_enum)?;

            let from_impls = source_fields.iter().filter(|field| field.from).map(|field| {
                let variant_name = &field.variant;
                let ty = &field.ty;
                quote! {
                    impl #impl_generics ::core::convert::From<#ty> for #name #ty_generics #where_clause {
                        fn from(source: #ty) -> Self {
                            Self::#variant_name(source)
                        }
                    }
                }
            });

            let error_body = if source_fields.is_empty() {
                quote! {}
            } else {
                let source_arms = source_fields.iter().map(|field| {
                    let variant_name = &field.variant;
                    let member = &field.member;
                    quote! {
                        Self::#variant_name { #member: source, .. } => ::core::option::Option::Some(
                            source as &(dyn ::std::error::Error + 'static),
                        ),
                    }
                });
                quote! {
                    fn source(&self) -> ::core::option::Option<&(dyn ::std::error::Error + 'static)> {
                        #[allow(unreachable_patterns)]
                        match self {
                            #(#source_arms)*
                            _ => ::core::option::Option::None,
                        }
                    }
                }
            };

            Ok(quote! {
                impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
                    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                        match self {
                            #(#display_arms)*
                        }
                    }
                }

                impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {
                    #error_body
                }

                #(#from_impls)*
            })
        }
        Data::Struct(_) | Data::Union(_) => Err(syn::Error::new_spanned(
            input,
            "Error derive only supports enums; give each failure its own variant",
        )),
    }
}

/// Field reported by `Error::source` for one variant.
struct SourceField {
    variant: syn::Ident,
    member: syn::Member,
    ty: syn::Type,
    /// Marked `#[from]`, so a `From` impl is generated too.
    from: bool,
}

/// Finds the field marked `#[from]` or `#[source]` in each variant.
///
/// `#[from]` is limited to single-field tuple variants; `#[source]` may sit on
/// any field. A variant carries at most one of them.
fn collect_source_fields(data_enum: &DataEnum) -> syn::Result<Vec<SourceField>> {
    let mut out = Vec::new();
    for variant in &data_enum.variants {
        let fields: Vec<&syn::Field> = match &variant.fields {
            Fields::Unnamed(fields) => fields.unnamed.iter().collect(),
            Fields::Named(fields) => fields.named.iter().collect(),
            Fields::Unit => continue,
        };

        let mut marked = fields.iter().enumerate().filter_map(|(index, field)| {
            let from = field.attrs.iter().any(|a| a.path().is_ident("from"));
            let source = field.attrs.iter().any(|a| a.path().is_ident("source"));
            (from || source).then_some((index, *field, from))
        });
        let Some((index, field, from)) = marked.next() else {
            continue;
        };
        if marked.next().is_some() {
            return Err(syn::Error::new_spanned(
                variant,
                "only one field per variant may be marked #[from] or #[source]",
            ));
        }
        if from && !(matches!(variant.fields, Fields::Unnamed(_)) && fields.len() == 1) {
            return Err(syn::Error::new_spanned(
                variant,
                "#[from] is only supported on tuple variants with exactly one field",
            ));
        }

        let member = match &field.ident {
            Some(ident) => syn::Member::Named(ident.clone()),
            None => syn::Member::Unnamed(syn::Index::from(index)),
        };
        out.push(SourceField {
            variant: variant.ident.clone(),
            member,
            ty: field.ty.clone(),
            from,
        });
    }
    Ok(out)
}

/// Extracts the message from a variant's `#[error("...")]` attribute.
fn extract_error_message(variant: &syn::Variant) -> syn::Result<String> {
    for attr in &variant.attrs {
        if attr.path().is_ident("error") {
            if let Meta::List(meta_list) = &attr.meta {
                let tokens = meta_list.tokens.clone();
                let lit = syn::parse2::<Lit>(tokens).map_err(|_| {
                    syn::Error::new_spanned(
                        &attr.meta,
                        "failed to parse #[error] attribute; expected a string literal like #[error(\"undefined identifier: {name}\")]",
                    )
                })?;

                if let Lit::Str(lit_str) = lit {
                    return Ok(lit_str.value());
                }

                return Err(syn::Error::new_spanned(
                    &attr.meta,
                    "invalid #[error] attribute: message must be a string literal, e.g. #[error(\"invalid opcode: {0}\")]",
                ));
            }

            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")] to describe the error",
            ));
        }
    }

    Err(syn::Error::new_spanned(
        &variant.ident,
        format!(
            "missing #[error(\"...\")] attribute on variant `{}`",
            variant.ident
        ),
    ))
}

/// Converts positional format args `{0}`, `{1}` to named args `{f0}`, `{f1}`.
///
/// Format specs are preserved, so `{0:#x}` becomes `{f0:#x}`.
fn convert_positional_to_named(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        result = result
            .replace(&format!("{{{}}}", i), &format!("{{f{}}}", i))
            .replace(&format!("{{{}:", i), &format!("{{f{}:", i));
    }
    result
}
