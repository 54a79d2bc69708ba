// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number and address normalization.
//!
//! Every address argument entering the session goes through
//! [`AddressNormalizer::normalize`] exactly once; everything downstream works
//! with the resulting [`Jid`].

use notigate_core::Jid;
use thiserror::Error;
use tracing::warn;

/// Local numbers use this leading digit in place of the country code.
const TRUNK_PREFIX: char = '0';

/// E.164 caps numbers at 15 digits.
const MAX_PHONE_DIGITS: usize = 15;

/// Shorter inputs cannot be a dialable number in any numbering plan we serve.
const MIN_PHONE_DIGITS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("`{input}` contains no digits")]
    NoDigits { input: String },

    #[error("`{input}` has {digits} digits, expected 6 to 15")]
    BadLength { input: String, digits: usize },

    #[error("`{input}` is not a valid address")]
    Malformed { input: String },
}

/// Converts caller-supplied phone numbers and addresses into [`Jid`]s.
#[derive(Debug, Clone)]
pub struct AddressNormalizer {
    country_code: String,
}

impl AddressNormalizer {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
        }
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// Normalizes one address. Pure; never touches the network.
    ///
    /// Inputs containing `@` are taken as pre-formed addresses. Anything else
    /// is a phone number: non-digits are stripped, then the country code is
    /// applied by replacing a leading trunk `0` or by prepending it.
    pub fn normalize(&self, input: &str) -> Result<Jid, AddressError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        if trimmed.contains('@') {
            let jid = Jid::parse(trimmed).ok_or_else(|| AddressError::Malformed {
                input: input.to_string(),
            })?;
            if !jid.is_well_formed() {
                warn!(address = %jid, "broadcast address is not numeric, passing through");
            }
            return Ok(jid);
        }

        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(AddressError::NoDigits {
                input: input.to_string(),
            });
        }
        if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
            return Err(AddressError::BadLength {
                input: input.to_string(),
                digits: digits.len(),
            });
        }

        Ok(Jid::individual(self.apply_country_code(digits)))
    }

    fn apply_country_code(&self, digits: String) -> String {
        if digits.starts_with(&self.country_code) {
            digits
        } else if let Some(local) = digits.strip_prefix(TRUNK_PREFIX) {
            format!("{}{local}", self.country_code)
        } else {
            format!("{}{digits}", self.country_code)
        }
    }
}
