//! Key-value records of diagnostics.
//!
//! Policies report per-iteration statistics through
//! [`Policy::log_diagnostics`](crate::Policy::log_diagnostics), which returns
//! a [`Record`].
//!
//! ```rust
//! use metapol_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("AveragePolicyStd", 1.0);
//! record.insert("NumPaths", RecordValue::Scalar(4.0));
//! assert_eq!(record.get_scalar("NumPaths").unwrap(), 4.0);
//! ```
mod base;
pub use base::{Record, RecordValue};
