//! Six-character referral aliases for account ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::TypesError;

pub const SHORT_CODE_LEN: usize = 6;

/// Characters a generated code is drawn from.
pub const SHORT_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Validated, upper-cased short code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortCode(String);

impl ShortCode {
    /// Parse user input. Lower-case letters are accepted and normalized.
    pub fn parse(input: &str) -> Result<Self, TypesError> {
        let code = input.trim().to_ascii_uppercase();
        if code.len() != SHORT_CODE_LEN {
            return Err(TypesError::InvalidShortCode(format!(
                "expected {SHORT_CODE_LEN} characters, got {}",
                code.len()
            )));
        }
        if !code.bytes().all(|b| SHORT_CODE_ALPHABET.contains(&b)) {
            return Err(TypesError::InvalidShortCode(format!(
                "'{input}' contains characters outside A-Z0-9"
            )));
        }
        Ok(Self(code))
    }

    /// Build a code from alphabet indices (each taken modulo the alphabet size).
    pub fn from_indices(indices: [usize; SHORT_CODE_LEN]) -> Self {
        let code = indices
            .iter()
            .map(|i| SHORT_CODE_ALPHABET[i % SHORT_CODE_ALPHABET.len()] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ShortCode {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ShortCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ShortCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
