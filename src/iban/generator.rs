//! IBAN Generator
//!
//! Builds PL IBANs whose account number encodes the owner:
//!
//! ```text
//! account number = "0000" + owner_id (10 digits) + sequence (2 digits)
//!                           └──── owner segment ───┘
//! ```

use super::error::IbanError;
use super::types::Iban;
use crate::core_types::OwnerId;

pub const DEFAULT_BANK_CODE: &str = "485";
pub const DEFAULT_BRANCH_CODE: &str = "1123";
pub const DEFAULT_NATIONAL_CHECK: char = '4';

const MAX_SEQUENCE: u32 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbanGenerator {
    bank_code: String,
    branch_code: String,
    national_check: char,
}

impl Default for IbanGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_BANK_CODE, DEFAULT_BRANCH_CODE, DEFAULT_NATIONAL_CHECK)
    }
}

impl IbanGenerator {
    pub fn new(bank_code: &str, branch_code: &str, national_check: char) -> Self {
        Self {
            bank_code: bank_code.to_string(),
            branch_code: branch_code.to_string(),
            national_check,
        }
    }

    /// Generate the IBAN for the `sequence`-th account of `owner_id`.
    ///
    /// # Errors
    /// - `SequenceOutOfRange` if `sequence > 99`
    /// - any parse error if the configured bank/branch codes do not fit the
    ///   PL layout
    pub fn generate(&self, owner_id: OwnerId, sequence: u32) -> Result<Iban, IbanError> {
        if sequence > MAX_SEQUENCE {
            return Err(IbanError::SequenceOutOfRange { sequence });
        }
        let bban = format!(
            "{}{}{}0000{:010}{:02}",
            self.bank_code, self.branch_code, self.national_check, owner_id, sequence
        );
        Iban::from_parts("PL", &bban)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_layout() {
        let iban = IbanGenerator::default().generate(123, 1).unwrap();
        assert_eq!(iban.as_str().len(), 28);
        assert_eq!(iban.country_code(), "PL");
        assert_eq!(iban.bank_code(), "485");
        assert_eq!(iban.account_number(), "0000000000012301");
        assert_eq!(iban.owner_segment().unwrap(), "0000000123");
        // formatted form has six separators
        assert_eq!(iban.formatted().len(), 34);
    }

    #[test]
    fn test_generated_ibans_are_unique() {
        let g = IbanGenerator::default();
        let a = g.generate(123, 1).unwrap();
        let b = g.generate(123, 2).unwrap();
        let c = g.generate(456, 1).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_generated_iban_reparses() {
        let iban = IbanGenerator::default().generate(u32::MAX, 99).unwrap();
        assert_eq!(Iban::parse(&iban.formatted()).unwrap(), iban);
    }

    #[test]
    fn test_sequence_out_of_range() {
        assert_eq!(
            IbanGenerator::default().generate(1, 100),
            Err(IbanError::SequenceOutOfRange { sequence: 100 })
        );
    }

    #[test]
    fn test_bad_bank_code_is_rejected() {
        let err = IbanGenerator::new("48", "1123", '4').generate(1, 1).unwrap_err();
        assert!(matches!(err, IbanError::InvalidLength { .. }));
    }
}
