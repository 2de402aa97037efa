//! # zs-types
//!
//! Shared identifiers, the scoring-oracle contract and the error taxonomy for
//! zero-shot portfolio selection.

pub mod errors;
pub mod records;
pub mod scorer;

pub use errors::*;
pub use records::*;
pub use scorer::*;
