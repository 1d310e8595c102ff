use crate::REQUIRED_VARIANTS;
use proc_macro2::Span;
use std::fmt;

/// A condition enum the derive refuses.
pub enum VerificationError {
    NotAnEnum,
    CarriesData(String),
    NotDependent(String),
    DependentArguments(String),
    OneRequiredVariant,
}

impl VerificationError {
    pub fn at(self, span: Span) -> syn::Error {
        syn::Error::new(span, self)
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use VerificationError::*;
        match self {
            NotAnEnum => f.write_str("ConditionType may only be derived on enums"),
            CarriesData(s) => write!(f, "condition {s} may not carry data"),
            NotDependent(s) => write!(f, "{s} is the happy condition and may not be a dependent"),
            DependentArguments(s) => write!(f, "#[dependent] on {s} takes no arguments"),
            OneRequiredVariant => write!(
                f,
                "ConditionType must contain exactly one {} variant",
                REQUIRED_VARIANTS.join(" or ")
            ),
        }
    }
}
