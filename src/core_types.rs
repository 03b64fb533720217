//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Account ID - globally unique identifier for an account.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Totally ordered**: The lock coordinator relies on `<` between ids
///   to derive the global acquisition order
/// - **Signed**: Negative ids are reserved for bank-owned accounts
///   (the house account collecting fees is `-1`)
///
/// Also used verbatim as the resource id in the lock registry.
pub type AccountId = i64;

/// Owner (customer) ID - encoded into the account number of every IBAN
/// generated for that customer.
pub type OwnerId = u32;

/// Transaction ID - assigned by the repository on insert
pub type TransactionId = u64;

/// House account that collects fees when a FEE transaction has no destination.
pub const HOUSE_ACCOUNT_ID: AccountId = -1;
