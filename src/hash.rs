use std::fmt;

use serde::de::{self, Unexpected, Visitor};

/// A visitor that deserializes a `0x` prefixed hex string of a fixed length,
/// returning the string without its prefix. The inner value is the expected
/// number of hex characters after the prefix.
pub(crate) struct HexString(pub usize);

impl<'de> Visitor<'de> for HexString {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "a string of {} hex characters prefixed with 0x",
            self.0
        )
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match s.strip_prefix("0x") {
            Some(digits) if digits.len() == self.0 => Ok(digits.to_string()),
            _ => Err(de::Error::invalid_value(Unexpected::Str(s), &self)),
        }
    }
}
