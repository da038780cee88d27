use std::fmt;

use crate::error::{Error, ErrorKind};

const MIN_DIGITS: usize = 7;
// E.164 upper bound.
const MAX_DIGITS: usize = 15;

/// Normalised recipient identifier: the digits of an international phone
/// number with formatting stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipientId(String);

impl RecipientId {
    /// Accepts `"+1 (555) 000-111"`, `"1555000111"` and similar; rejects
    /// anything that is not 7 to 15 digits once punctuation is removed.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '+' | '-' | '.' | '(' | ')'))
            .collect();

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::new(
                ErrorKind::InvalidRecipient,
                &format!("'{raw}' is not a phone number"),
            ));
        }
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(Error::new(
                ErrorKind::InvalidRecipient,
                &format!("'{raw}' has {} digits", digits.len()),
            ));
        }

        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecipientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
