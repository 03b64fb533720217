//! IBAN value type
//!
//! Parsing enforces the country layout, character set and ISO 7064 mod-97
//! check digits. The value is stored in electronic form (no spaces, uppercase).

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::IbanError;

// ============================================================================
// Country Layouts
// ============================================================================

/// Segment positions of a national IBAN format, as offsets into the
/// electronic form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IbanLayout {
    pub country: &'static str,
    pub length: usize,
    pub bank_code: Range<usize>,
    pub account_number: Range<usize>,
}

/// Layouts accepted by [`Iban::parse`]
pub static LAYOUTS: &[IbanLayout] = &[
    // PLkk BBBS SSSX CCCC CCCC CCCC CCCC
    IbanLayout {
        country: "PL",
        length: 28,
        bank_code: 4..7,
        account_number: 12..28,
    },
    // DEkk BBBB BBBB CCCC CCCC CC
    IbanLayout {
        country: "DE",
        length: 22,
        bank_code: 4..12,
        account_number: 12..22,
    },
    // GBkk BBBB SSSS SSCC CCCC CC
    IbanLayout {
        country: "GB",
        length: 22,
        bank_code: 4..8,
        account_number: 14..22,
    },
    // NLkk BBBB CCCC CCCC CC
    IbanLayout {
        country: "NL",
        length: 18,
        bank_code: 4..8,
        account_number: 8..18,
    },
];

pub fn layout_for(country: &str) -> Option<&'static IbanLayout> {
    LAYOUTS.iter().find(|l| l.country == country)
}

/// Owner-identifying slice of the account number
const OWNER_SEGMENT: Range<usize> = 4..14;

// ============================================================================
// Iban
// ============================================================================

/// Validated IBAN (electronic form)
///
/// Fields are private to force validation through [`Iban::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iban {
    value: String,
    layout: &'static IbanLayout,
}

impl Iban {
    /// Parse and validate an IBAN
    ///
    /// # Validation Rules
    /// - Whitespace is ignored, letters are uppercased
    /// - Only ASCII letters and digits
    /// - Country must have a known layout, length must match it
    /// - Check digits are numeric and satisfy mod-97 == 1
    pub fn parse(input: &str) -> Result<Self, IbanError> {
        let value: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IbanError::InvalidCharacters {
                masked: mask_raw(input),
            });
        }

        let country = value.get(..2).unwrap_or(value.as_str());
        let layout = layout_for(country).ok_or_else(|| IbanError::UnsupportedCountry {
            country: country.to_string(),
        })?;

        if value.len() != layout.length {
            return Err(IbanError::InvalidLength {
                country: layout.country.to_string(),
                expected: layout.length,
                actual: value.len(),
            });
        }

        if !value[2..4].chars().all(|c| c.is_ascii_digit()) {
            return Err(IbanError::InvalidCharacters {
                masked: mask_raw(&value),
            });
        }

        if mod97(value[4..].chars().chain(value[..4].chars())) != 1 {
            return Err(IbanError::InvalidChecksum {
                masked: mask_raw(&value),
            });
        }

        Ok(Self { value, layout })
    }

    /// Build an IBAN from a country code and BBAN, computing the check digits
    pub fn from_parts(country: &str, bban: &str) -> Result<Self, IbanError> {
        let country = country.to_ascii_uppercase();
        let bban = bban.to_ascii_uppercase();
        let remainder = mod97(bban.chars().chain(country.chars()).chain("00".chars()));
        Self::parse(&format!("{}{:02}{}", country, 98 - remainder, bban))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn country_code(&self) -> &str {
        &self.value[..2]
    }

    pub fn check_digits(&self) -> &str {
        &self.value[2..4]
    }

    pub fn bank_code(&self) -> &str {
        &self.value[self.layout.bank_code.clone()]
    }

    pub fn account_number(&self) -> &str {
        &self.value[self.layout.account_number.clone()]
    }

    /// The ten account-number characters that encode the owner.
    ///
    /// Only layouts with an account number of at least 14 characters carry
    /// the segment.
    pub fn owner_segment(&self) -> Result<&str, IbanError> {
        self.account_number()
            .get(OWNER_SEGMENT)
            .ok_or_else(|| IbanError::OwnerSegmentUnavailable {
                masked: self.masked(),
            })
    }

    pub fn layout(&self) -> &'static IbanLayout {
        self.layout
    }

    /// Log-safe form: country, check digits and bank code, then `*` up to the
    /// last four characters.
    pub fn masked(&self) -> String {
        let visible_prefix = self.layout.bank_code.end;
        let hidden = self.value.len() - visible_prefix - 4;
        format!(
            "{}{}{}",
            &self.value[..visible_prefix],
            "*".repeat(hidden),
            &self.value[self.value.len() - 4..]
        )
    }

    /// Print format: groups of four separated by a space
    pub fn formatted(&self) -> String {
        self.value
            .as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Iban {
    type Err = IbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Iban {
    type Error = IbanError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Iban> for String {
    fn from(iban: Iban) -> Self {
        iban.value
    }
}

impl AsRef<str> for Iban {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// Mask input that may not be a valid IBAN: first four and last four
/// characters kept, everything else replaced by `*`.
pub fn mask_raw(input: &str) -> String {
    let chars: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let mut masked = String::with_capacity(chars.len());
    masked.extend(&chars[..4]);
    masked.extend(std::iter::repeat_n('*', chars.len() - 8));
    masked.extend(&chars[chars.len() - 4..]);
    masked
}

/// ISO 7064 MOD 97-10 over alphanumeric characters (A=10 .. Z=35)
fn mod97(chars: impl Iterator<Item = char>) -> u32 {
    chars.fold(0u32, |acc, c| match c.to_digit(36) {
        Some(d) if d >= 10 => (acc * 100 + d) % 97,
        Some(d) => (acc * 10 + d) % 97,
        None => acc,
    })
}
