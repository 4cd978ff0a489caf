//! Token amount conversions.

use std::fmt;

use crate::error::Error;
use crate::error::Result;

/// Nanotokens per token.
pub const NANO: u128 = 1_000_000_000;

/// A token amount held as nanotokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tokens(pub u128);

impl Tokens {
    pub fn from_nano(nano: u128) -> Self {
        Self(nano)
    }

    pub fn nano(self) -> u128 {
        self.0
    }
}

impl fmt::Display for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / NANO;
        let frac = self.0 % NANO;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:09}", frac);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

/// Parses a hex nanotoken amount such as `"0x3b9aca00"` (1 token).
pub fn convert_hex_to_token(hex: &str) -> Result<Tokens> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    if digits.is_empty() {
        return Ok(Tokens(0));
    }
    u128::from_str_radix(digits, 16)
        .map(Tokens)
        .map_err(|e| Error::Deserialization(format!("invalid hex amount {:?}: {}", hex, e)))
}
