//! IBAN handling
//!
//! Parsing/validation, masking for logs, generation of house IBANs and the
//! structural analysis that decides the transfer tier.

pub mod analyzer;
pub mod error;
pub mod generator;
pub mod types;

pub use analyzer::{IbanAnalyzer, TransferCategory};
pub use error::IbanError;
pub use generator::IbanGenerator;
pub use types::{Iban, mask_raw};
