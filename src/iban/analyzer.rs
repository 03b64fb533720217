//! IBAN Analyzer
//!
//! Classifies a (source, destination) IBAN pair into an OWN, INTERNAL or
//! EXTERNAL transfer. Purely structural: no lookups, no side effects.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::error::IbanError;
use super::types::{Iban, mask_raw};
use crate::transaction::TransactionType;

/// Transfer tier derived from two IBANs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferCategory {
    /// Same bank, same owner
    Own,
    /// Same bank, different owner
    Internal,
    /// Different bank (or country)
    External,
}

impl TransferCategory {
    pub fn transaction_type(self) -> TransactionType {
        match self {
            TransferCategory::Own => TransactionType::TransferOwn,
            TransferCategory::Internal => TransactionType::TransferInternal,
            TransferCategory::External => TransactionType::TransferExternal,
        }
    }
}

impl From<TransferCategory> for TransactionType {
    fn from(category: TransferCategory) -> Self {
        category.transaction_type()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IbanAnalyzer;

impl IbanAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Bank code and country code both equal
    pub fn same_bank(&self, a: &Iban, b: &Iban) -> bool {
        trace!(a = %a.masked(), b = %b.masked(), "Comparing bank codes");
        a.country_code() == b.country_code() && a.bank_code() == b.bank_code()
    }

    /// Owner segment (account number positions 4..14) equal.
    ///
    /// IBANs whose layout has no owner segment never match.
    pub fn same_owner(&self, a: &Iban, b: &Iban) -> bool {
        trace!(a = %a.masked(), b = %b.masked(), "Comparing owner segments");
        match (a.owner_segment(), b.owner_segment()) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        }
    }

    /// EXTERNAL if the banks differ, else OWN if the owners match, else INTERNAL
    pub fn classify(&self, source: &Iban, destination: &Iban) -> TransferCategory {
        let category = if !self.same_bank(source, destination) {
            TransferCategory::External
        } else if self.same_owner(source, destination) {
            TransferCategory::Own
        } else {
            TransferCategory::Internal
        };

        debug!(
            source = %source.masked(),
            destination = %destination.masked(),
            ?category,
            "Resolved transfer category"
        );
        category
    }

    /// Parse both raw IBANs and classify them.
    ///
    /// A parse failure is reported as [`IbanError::Analysis`] with both
    /// inputs masked.
    pub fn classify_raw(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<TransferCategory, IbanError> {
        let parsed = Iban::parse(source).and_then(|s| Ok((s, Iban::parse(destination)?)));
        match parsed {
            Ok((s, d)) => Ok(self.classify(&s, &d)),
            Err(e) => Err(IbanError::Analysis {
                source_iban: mask_raw(source),
                destination_iban: mask_raw(destination),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iban::IbanGenerator;

    fn generator() -> IbanGenerator {
        IbanGenerator::default()
    }

    #[test]
    fn test_same_owner_different_sequence_is_own() {
        let g = generator();
        let a = g.generate(123, 1).unwrap();
        let b = g.generate(123, 2).unwrap();
        let analyzer = IbanAnalyzer::new();

        assert!(analyzer.same_bank(&a, &b));
        assert!(analyzer.same_owner(&a, &b));
        assert_eq!(analyzer.classify(&a, &b), TransferCategory::Own);
        assert_eq!(analyzer.classify(&b, &a), TransferCategory::Own);
    }

    #[test]
    fn test_different_owner_same_bank_is_internal() {
        let g = generator();
        let a = g.generate(123, 1).unwrap();
        let b = g.generate(456, 1).unwrap();
        let analyzer = IbanAnalyzer::new();

        assert!(!analyzer.same_owner(&a, &b));
        assert_eq!(analyzer.classify(&a, &b), TransferCategory::Internal);
        assert_eq!(analyzer.classify(&b, &a), TransferCategory::Internal);
    }

    #[test]
    fn test_different_bank_is_external_regardless_of_owner() {
        let ours = generator().generate(123, 1).unwrap();
        let theirs = IbanGenerator::new("101", "1123", '4')
            .generate(123, 1)
            .unwrap();
        let analyzer = IbanAnalyzer::new();

        // same owner segment, different bank code
        assert!(analyzer.same_owner(&ours, &theirs));
        assert!(!analyzer.same_bank(&ours, &theirs));
        assert_eq!(analyzer.classify(&ours, &theirs), TransferCategory::External);
        assert_eq!(analyzer.classify(&theirs, &ours), TransferCategory::External);
    }

    #[test]
    fn test_foreign_layout_without_owner_segment() {
        let a = Iban::parse("DE89370400440532013000").unwrap();
        let b = Iban::parse("DE89370400440532013000").unwrap();
        let analyzer = IbanAnalyzer::new();
        // same bank, owner cannot be determined
        assert_eq!(analyzer.classify(&a, &b), TransferCategory::Internal);

        let nl = Iban::parse("NL91ABNA0417164300").unwrap();
        assert_eq!(analyzer.classify(&a, &nl), TransferCategory::External);
    }

    #[test]
    fn test_classify_raw_masks_on_failure() {
        let analyzer = IbanAnalyzer::new();
        let valid = generator().generate(7, 1).unwrap();

        let err = analyzer
            .classify_raw(valid.as_str(), "PL00485112340000000000000701")
            .unwrap_err();
        match err {
            IbanError::Analysis {
                source_iban,
                destination_iban,
                ..
            } => {
                assert!(!source_iban.contains(&valid.as_str()[4..24]));
                assert!(destination_iban.starts_with("PL00"));
                assert!(destination_iban.ends_with("0701"));
                assert!(destination_iban.contains('*'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_category_maps_to_transaction_type() {
        assert_eq!(
            TransactionType::from(TransferCategory::Own),
            TransactionType::TransferOwn
        );
        assert_eq!(
            TransferCategory::External.transaction_type(),
            TransactionType::TransferExternal
        );
    }
}
