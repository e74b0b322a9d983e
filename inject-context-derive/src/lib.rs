//! Derive macro for inject-context
//!
//! `#[derive(Injectable)]` writes the `ClassDescriptor` of a struct with named
//! fields. Fields marked `#[inject]` become the parameters of an inject
//! constructor, in declaration order; every other field is filled with
//! `Default::default()`.
//!
//! # Example
//!
//! ```rust,ignore
//! use inject_context::{Injectable, Provider};
//! use std::sync::Arc;
//!
//! #[derive(Injectable)]
//! #[singleton]
//! struct UserService {
//!     #[inject]
//!     db: Arc<dyn Database>,
//!     #[inject]
//!     #[named("primary")]
//!     cache: Arc<Cache>,
//!     #[inject]
//!     audit: Provider<dyn AuditLog>,
//!     // Non-injected fields use Default
//!     request_count: u64,
//! }
//! ```
//!
//! # Attributes
//!
//! - `#[inject]` on a field of type `Arc<T>` or `Provider<T>`
//! - `#[named("value")]` on an inject field: the `@Named` qualifier
//! - `#[qualifier("Name")]` on an inject field: a custom qualifier
//! - `#[singleton]` on the struct: the singleton scope marker
//! - `#[scope("Name")]` on the struct: a custom scope marker

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr, Type};

/// Derive `inject_context::Injectable`.
#[proc_macro_derive(Injectable, attributes(inject, named, qualifier, singleton, scope))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let class_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Only support structs with named fields
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Injectable can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Injectable can only be derived for structs",
            ));
        }
    };

    let class_annotations = class_scopes(&input.attrs)?;

    let mut parameters = Vec::new();
    let mut field_inits = Vec::new();

    for field in fields.iter() {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let field_type = &field.ty;

        if !field.attrs.iter().any(|a| a.path().is_ident("inject")) {
            if let Some(attr) = field
                .attrs
                .iter()
                .find(|a| a.path().is_ident("named") || a.path().is_ident("qualifier"))
            {
                return Err(syn::Error::new_spanned(
                    attr,
                    "Qualifiers are only allowed on fields marked with #[inject]",
                ));
            }
            field_inits.push(quote! {
                #field_name: ::std::default::Default::default()
            });
            continue;
        }

        let (kind, inner) = classify(field_type).ok_or_else(|| {
            syn::Error::new_spanned(
                field_type,
                "Fields marked with #[inject] must have type Arc<T> or Provider<T>",
            )
        })?;

        let qualifiers = field_qualifiers(&field.attrs)?;
        let param_name = field_name.to_string();
        parameters.push(quote! {
            ::inject_context::Parameter::of::<#field_type>(#param_name)
                #(.annotated(#qualifiers))*
        });

        field_inits.push(match kind {
            Injected::Instance => quote! { #field_name: args.instance::<#inner>()? },
            Injected::Provider => quote! { #field_name: args.provider::<#inner>()? },
        });
    }

    let args = if parameters.is_empty() {
        quote! { _args }
    } else {
        quote! { args }
    };

    Ok(quote! {
        impl #impl_generics ::inject_context::Injectable for #name #ty_generics #where_clause {
            fn descriptor() -> ::inject_context::ClassDescriptor<Self> {
                ::inject_context::ClassDescriptor::new(#class_name)
                    #(.annotated(#class_annotations))*
                    .inject_constructor(
                        ::std::vec![#(#parameters),*],
                        |#args: &mut ::inject_context::Arguments| {
                            ::std::result::Result::Ok(Self {
                                #(#field_inits),*
                            })
                        },
                    )
            }
        }
    })
}

/// How an inject field receives its dependency
enum Injected {
    Instance,
    Provider,
}

/// Split `Arc<T>` / `Provider<T>` into the wrapper kind and `T`
fn classify(ty: &Type) -> Option<(Injected, &Type)> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        let kind = if segment.ident == "Arc" {
            Injected::Instance
        } else if segment.ident == "Provider" {
            Injected::Provider
        } else {
            return None;
        };
        if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
            if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                return Some((kind, inner));
            }
        }
    }
    None
}

/// `#[named("x")]` and `#[qualifier("X")]` on a field
fn field_qualifiers(attrs: &[Attribute]) -> syn::Result<Vec<proc_macro2::TokenStream>> {
    let mut qualifiers = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("named") {
            let value: LitStr = attr.parse_args()?;
            qualifiers.push(quote! { ::inject_context::Annotation::named(#value) });
        } else if attr.path().is_ident("qualifier") {
            let value: LitStr = attr.parse_args()?;
            qualifiers.push(quote! { ::inject_context::Annotation::qualifier(#value) });
        }
    }
    Ok(qualifiers)
}

/// `#[singleton]` and `#[scope("Name")]` on the struct
fn class_scopes(attrs: &[Attribute]) -> syn::Result<Vec<proc_macro2::TokenStream>> {
    let mut scopes = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("singleton") {
            attr.meta.require_path_only()?;
            scopes.push(quote! { ::inject_context::Annotation::singleton() });
        } else if attr.path().is_ident("scope") {
            let value: LitStr = attr.parse_args()?;
            scopes.push(quote! { ::inject_context::Annotation::scope(#value) });
        }
    }
    Ok(scopes)
}
