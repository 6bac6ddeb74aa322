//! # uidassign-id
//!
//! Value types shared by the uidassign ledger and its callers.
//!
//! ## Design Principles
//!
//! - Identities are stable and externally issued; labels are audit-only text
//! - Counter classes form a closed set, each feeding one directory attribute
//! - Assigned IDs are POSIX IDs and never leave the `u32` range
//!
//! ## Identity Format
//!
//! A [`StableIdentity`] is the 128-bit `objectGUID` of a directory object.
//! Its text form is the hyphenated GUID:
//!
//! - `5f1c2a3b-0d4e-4f60-8a71-92b3c4d5e6f7`
//!
//! On disk it is stored in the little-endian GUID byte layout, the same order
//! the directory returns for the raw attribute.

mod error;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export uuid for consumers that construct identities from raw GUIDs
pub use uuid::Uuid;
