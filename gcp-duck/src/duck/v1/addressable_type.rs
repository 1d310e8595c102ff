use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Addressable provides a generic mechanism for a custom resource
/// definition to indicate a destination for message delivery.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Addressable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
}

impl From<Url> for Addressable {
    fn from(url: Url) -> Self {
        Addressable { url: Some(url) }
    }
}

/// AddressStatus shows how we expect folks to embed Addressable in
/// their Status field.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct AddressStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Addressable>,
}

impl AddressStatus {
    /// The url of the address, if one has been published.
    pub fn url(&self) -> Option<&Url> {
        self.address.as_ref().and_then(|a| a.url.as_ref())
    }
}
