use crate::{error::VerificationError, REQUIRED_VARIANTS};
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{spanned::Spanned, Data, DeriveInput, Fields, Ident, Result, Variant};

/// The variants of a condition enum, split by the part they play in readiness.
struct Layout<'a> {
    happy: &'a Ident,
    /// In declaration order, which is the dependency order.
    dependents: Vec<&'a Ident>,
    /// Every variant but the happy one, informational ones included.
    markable: Vec<&'a Ident>,
}

/// Whether the variant is tagged `#[dependent]`, rejecting `#[dependent(...)]`.
fn dependent_attribute(variant: &Variant) -> Result<bool> {
    let mut dependent = false;
    for attr in variant.attrs.iter().filter(|a| a.path.is_ident("dependent")) {
        if !attr.tokens.is_empty() {
            return Err(VerificationError::DependentArguments(variant.ident.to_string()).at(attr.span()));
        }
        dependent = true;
    }
    Ok(dependent)
}

fn layout(input: &DeriveInput) -> Result<Layout<'_>> {
    let Data::Enum(data) = &input.data else {
        return Err(VerificationError::NotAnEnum.at(input.span()));
    };

    let mut happy = None;
    let mut dependents = Vec::new();
    let mut markable = Vec::new();

    for variant in &data.variants {
        let name = &variant.ident;
        if !matches!(variant.fields, Fields::Unit) {
            return Err(VerificationError::CarriesData(name.to_string()).at(variant.span()));
        }
        let dependent = dependent_attribute(variant)?;

        if REQUIRED_VARIANTS.contains(&name.to_string().as_str()) {
            if dependent {
                return Err(VerificationError::NotDependent(name.to_string()).at(variant.span()));
            }
            if happy.replace(name).is_some() {
                return Err(VerificationError::OneRequiredVariant.at(variant.span()));
            }
            continue;
        }

        if dependent {
            dependents.push(name);
        }
        markable.push(name);
    }

    let happy = happy.ok_or_else(|| VerificationError::OneRequiredVariant.at(input.ident.span()))?;
    Ok(Layout { happy, dependents, markable })
}

pub fn inner_derive(ast: DeriveInput) -> Result<TokenStream> {
    let name = &ast.ident;
    let Layout { happy, dependents, markable } = layout(&ast)?;

    let accessor: Vec<Ident> = markable.iter()
        .map(|v| Ident::new(&v.to_string().to_lowercase(), v.span()))
        .collect();
    let accessor_doc = markable.iter().map(|v| format!("Returns the `{v}` variant of the [`ConditionType`]"));
    let mark = accessor.iter().map(|a| format_ident!("mark_{}", a));
    let mark_with_reason = accessor.iter().map(|a| format_ident!("mark_{}_with_reason", a));
    let mark_not = accessor.iter().map(|a| format_ident!("mark_not_{}", a));
    let mark_unknown = accessor.iter().map(|a| format_ident!("mark_{}_unknown", a));

    let type_trait = format_ident!("{}Type", name);
    let type_trait_doc = format!("A [`ConditionType`] that implement this trait duck types to [`{name}`].");
    let manager_trait = format_ident!("{}Manager", name);
    let manager_trait_doc = format!("Allows a status to manage [`{name}`].");

    Ok(quote! {
        #[doc = #type_trait_doc]
        pub trait #type_trait: ::gcp_conditions::ConditionType {
            #(
                #[doc = #accessor_doc]
                fn #accessor() -> Self;
            )*
        }

        #[automatically_derived]
        impl #type_trait for #name {
            #(
                #[inline]
                fn #accessor() -> Self {
                    #name::#markable
                }
            )*
        }

        #[automatically_derived]
        impl ::gcp_conditions::ConditionType for #name {
            #[inline]
            fn happy() -> Self {
                #name::#happy
            }

            #[inline]
            fn dependents() -> &'static [Self] {
                &[#(#name::#dependents),*]
            }
        }

        #[automatically_derived]
        impl Default for #name {
            fn default() -> Self {
                #name::#happy
            }
        }

        #[automatically_derived]
        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::write!(f, "{:?}", self)
            }
        }

        #[doc = #manager_trait_doc]
        pub trait #manager_trait<S>: ::gcp_conditions::ConditionAccessor<S>
        where S: #type_trait {
            #(
                fn #mark(&mut self) {
                    self.manager().mark_true(S::#accessor());
                }

                fn #mark_with_reason(&mut self, reason: &str, message: Option<String>) {
                    self.manager().mark_true_with_reason(S::#accessor(), reason, message);
                }

                fn #mark_not(&mut self, reason: &str, message: Option<String>) {
                    self.manager().mark_false(S::#accessor(), reason, message);
                }

                fn #mark_unknown(&mut self, reason: &str, message: Option<String>) {
                    self.manager().mark_unknown(S::#accessor(), reason, message);
                }
            )*
        }

        impl<S: #type_trait, T: ::gcp_conditions::ConditionAccessor<S> + ?Sized> #manager_trait<S> for T {}
    }.into())
}
