//! Node identities.
//!
//! Identities are integers of unbounded width: the label-code scheme turns
//! every character of a label into its decimal code point, so a twelve
//! character label already needs more digits than a `u128` holds. A
//! [`NodeId`] therefore stores the canonical decimal form and orders
//! numerically.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Errors that can occur while building a node identity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseNodeIdError {
    #[error("empty identity")]
    Empty,

    #[error("invalid digit in identity: {0:?}")]
    InvalidDigit(String),
}

/// How identities are synthesized for nodes without a supplied `ID`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityScheme {
    /// Concatenated decimal character codes of the label (`"AB"` -> `6566`).
    ///
    /// Reproduces identities produced by earlier tooling but collides for
    /// labels such as `"\u{1}\u{17}"` and `"\u{c}\u{3}"`.
    #[default]
    LabelCodes,
    /// First eight bytes of SHA-256 over the label, read big-endian.
    Hashed,
}

impl IdentityScheme {
    pub fn derive(&self, label: &str) -> Result<NodeId, ParseNodeIdError> {
        match self {
            IdentityScheme::LabelCodes => NodeId::from_label_codes(label),
            IdentityScheme::Hashed => Ok(NodeId::from_label_hash(label)),
        }
    }
}

impl fmt::Display for IdentityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityScheme::LabelCodes => write!(f, "label-codes"),
            IdentityScheme::Hashed => write!(f, "hashed"),
        }
    }
}

impl FromStr for IdentityScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "label-codes" | "label_codes" | "labelcodes" => Ok(IdentityScheme::LabelCodes),
            "hashed" | "sha256" => Ok(IdentityScheme::Hashed),
            other => Err(format!("unknown identity scheme '{}'", other)),
        }
    }
}

/// Stable integer identity of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NodeId {
    negative: bool,
    /// Decimal magnitude without leading zeros (`"0"` for zero).
    digits: String,
}

impl NodeId {
    pub fn from_u64(value: u64) -> Self {
        Self {
            negative: false,
            digits: value.to_string(),
        }
    }

    /// Concatenate the decimal code point of every character of `label`.
    pub fn from_label_codes(label: &str) -> Result<Self, ParseNodeIdError> {
        let codes: String = label.chars().map(|ch| (ch as u32).to_string()).collect();
        codes.parse()
    }

    pub fn from_label_hash(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self::from_u64(u64::from_be_bytes(prefix))
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// The value as a `u64`, if it fits.
    pub fn as_u64(&self) -> Option<u64> {
        if self.negative {
            None
        } else {
            self.digits.parse().ok()
        }
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        self.digits
            .len()
            .cmp(&other.digits.len())
            .then_with(|| self.digits.cmp(&other.digits))
    }
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        if body.is_empty() {
            return Err(ParseNodeIdError::Empty);
        }
        if !body.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseNodeIdError::InvalidDigit(s.to_string()));
        }

        let trimmed = body.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };

        Ok(Self {
            // -0 is 0
            negative: negative && digits != "0",
            digits: digits.to_string(),
        })
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        }
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.digits)
        } else {
            write!(f, "{}", self.digits)
        }
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for NodeId {
    type Error = ParseNodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[test]
    fn test_label_codes() {
        assert_eq!(NodeId::from_label_codes("A").unwrap(), NodeId::from_u64(65));
        assert_eq!(NodeId::from_label_codes("AB").unwrap(), NodeId::from_u64(6566));
        assert_eq!(NodeId::from_label_codes("1").unwrap(), NodeId::from_u64(49));
        assert!(NodeId::from_label_codes("").is_err());
    }

    #[test]
    fn test_long_labels_do_not_overflow() {
        let long = NodeId::from_label_codes("Switch-Core-Aggregation-01").unwrap();
        assert!(long.as_u64().is_none());
        assert!(long > NodeId::from_u64(u64::MAX));
        assert!(long.to_string().starts_with("83119105116"));
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(id("9") < id("10"));
        assert!(id("007") == id("7"));
        assert!(id("-5") < id("3"));
        assert!(id("-10") < id("-9"));
        assert_eq!(id("-0"), id("0"));
        assert_eq!(id("+42"), NodeId::from_u64(42));
    }

    #[test]
    fn test_invalid_identities() {
        assert_eq!("".parse::<NodeId>(), Err(ParseNodeIdError::Empty));
        assert!("12a".parse::<NodeId>().is_err());
        assert!("1.5".parse::<NodeId>().is_err());
        assert!("-".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_hashed_scheme_is_stable() {
        let a = IdentityScheme::Hashed.derive("AB").unwrap();
        let b = IdentityScheme::Hashed.derive("BA").unwrap();
        assert_eq!(a, IdentityScheme::Hashed.derive("AB").unwrap());
        assert_ne!(a, b);
        assert!(a.as_u64().is_some());
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("hashed".parse::<IdentityScheme>(), Ok(IdentityScheme::Hashed));
        assert_eq!("label-codes".parse::<IdentityScheme>(), Ok(IdentityScheme::LabelCodes));
        assert!("md5".parse::<IdentityScheme>().is_err());
    }
}
