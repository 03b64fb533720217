//! IBAN Error Types

use thiserror::Error;

/// IBAN parsing and analysis errors.
///
/// Variants carry IBANs only in masked form, so they are safe to log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IbanError {
    #[error("Invalid IBAN length for {country}: expected {expected}, got {actual}")]
    InvalidLength {
        country: String,
        expected: usize,
        actual: usize,
    },

    #[error("IBAN contains invalid characters: {masked}")]
    InvalidCharacters { masked: String },

    #[error("Unsupported IBAN country: {country}")]
    UnsupportedCountry { country: String },

    #[error("IBAN checksum mismatch: {masked}")]
    InvalidChecksum { masked: String },

    #[error("IBAN {masked} has no owner segment")]
    OwnerSegmentUnavailable { masked: String },

    #[error("Account sequence {sequence} does not fit in two digits")]
    SequenceOutOfRange { sequence: u32 },

    #[error("Failed to analyze IBANs {source_iban} -> {destination_iban}: {reason}")]
    Analysis {
        source_iban: String,
        destination_iban: String,
        reason: String,
    },
}

impl IbanError {
    pub fn code(&self) -> &'static str {
        match self {
            IbanError::InvalidLength { .. } => "IBAN_INVALID_LENGTH",
            IbanError::InvalidCharacters { .. } => "IBAN_INVALID_CHARACTERS",
            IbanError::UnsupportedCountry { .. } => "IBAN_UNSUPPORTED_COUNTRY",
            IbanError::InvalidChecksum { .. } => "IBAN_INVALID_CHECKSUM",
            IbanError::OwnerSegmentUnavailable { .. } => "IBAN_NO_OWNER_SEGMENT",
            IbanError::SequenceOutOfRange { .. } => "IBAN_SEQUENCE_OUT_OF_RANGE",
            IbanError::Analysis { .. } => "IBAN_ANALYSIS_FAILED",
        }
    }
}
