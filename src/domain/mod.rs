//! Canonical view-model records derived from remote API responses.
//!
//! The remote API is loose about shapes (`author` may be a string or an
//! object, lists may arrive bare or wrapped in an envelope). Everything is
//! normalized into these records at the API-client boundary so handlers and
//! templates never branch on shape.

mod entities;

pub use entities::*;
