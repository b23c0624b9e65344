//! Payment rails and the external reference that ties a callback to a payment.

use crate::domain::foundation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_REFERENCE_LEN: usize = 255;

/// External payment rail that a payment is settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRail {
    /// Card payments via a payment-intent provider.
    Card,

    /// Cryptocurrency deposits to a dedicated receiving address.
    Crypto,
}

impl PaymentRail {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRail::Card => "card",
            PaymentRail::Crypto => "crypto",
        }
    }
}

impl fmt::Display for PaymentRail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentRail {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "card" => Ok(PaymentRail::Card),
            "crypto" => Ok(PaymentRail::Crypto),
            other => Err(ValidationError::invalid_format(
                "rail",
                format!("unknown payment rail '{}'", other),
            )),
        }
    }
}

/// Rail-supplied identifier, unique per rail.
///
/// Construction rejects control characters, so the value is always safe
/// to write into a log line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalReference(String);

impl ExternalReference {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("external_reference"));
        }
        if trimmed.len() > MAX_REFERENCE_LEN {
            return Err(ValidationError::invalid_format(
                "external_reference",
                format!("longer than {} characters", MAX_REFERENCE_LEN),
            ));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(ValidationError::invalid_format(
                "external_reference",
                "contains control characters",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ExternalReference {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExternalReference> for String {
    fn from(reference: ExternalReference) -> Self {
        reference.0
    }
}

/// Identifier as seen in the rail's own terms.
///
/// Both payment creation and callbacks go through this type, so the
/// derived [`ExternalReference`] is the same on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rail", rename_all = "snake_case")]
pub enum RailIdentifier {
    /// Card payment intent id returned by the provider at creation time.
    Card { intent_id: String },

    /// Dedicated crypto receiving address, optionally a wallet sub-address index.
    Crypto {
        address: String,
        #[serde(default)]
        subaddress_index: Option<u32>,
    },
}

impl RailIdentifier {
    pub fn card(intent_id: impl Into<String>) -> Self {
        RailIdentifier::Card {
            intent_id: intent_id.into(),
        }
    }

    pub fn crypto(address: impl Into<String>, subaddress_index: Option<u32>) -> Self {
        RailIdentifier::Crypto {
            address: address.into(),
            subaddress_index,
        }
    }

    pub fn rail(&self) -> PaymentRail {
        match self {
            RailIdentifier::Card { .. } => PaymentRail::Card,
            RailIdentifier::Crypto { .. } => PaymentRail::Crypto,
        }
    }

    /// Derives the ledger key for this identifier.
    ///
    /// Card references are the intent id verbatim. Crypto references are the
    /// address, suffixed with `#<index>` when a sub-address index is known.
    pub fn to_reference(&self) -> Result<ExternalReference, ValidationError> {
        match self {
            RailIdentifier::Card { intent_id } => ExternalReference::new(intent_id.as_str()),
            RailIdentifier::Crypto {
                address,
                subaddress_index,
            } => {
                if address.contains('#') {
                    return Err(ValidationError::invalid_format(
                        "address",
                        "must not contain '#'",
                    ));
                }
                match subaddress_index {
                    Some(index) => ExternalReference::new(format!("{}#{}", address.trim(), index)),
                    None => ExternalReference::new(address.as_str()),
                }
            }
        }
    }
}
