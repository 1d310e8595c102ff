//! Derive [`ConditionType`] on your own condition enums to get dependency-ordered readiness and
//! typed `mark_*` helpers on any status implementing `ConditionAccessor`.
//!
//! Exactly one variant must be named `Ready` or `Succeeded`; it becomes the happy condition.
//! Variants tagged `#[dependent]` must all be true for the happy condition to be true, and their
//! declaration order is the order in which an unhappy dependent is surfaced.
mod error;
mod inner;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

pub(crate) const REQUIRED_VARIANTS: [&str; 2] = ["Ready", "Succeeded"];

#[proc_macro_derive(ConditionType, attributes(dependent))]
pub fn derive_condition_type(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    inner::inner_derive(ast).unwrap_or_else(|e| e.to_compile_error().into())
}
