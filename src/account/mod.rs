//! Accounts
//!
//! Account model with checked balance arithmetic and the storage port the
//! transaction engine mutates balances through.

pub mod error;
pub mod models;
pub mod store;

pub use error::AccountError;
pub use models::Account;
pub use store::{AccountProvider, InMemoryAccountStore};
