//! Domain layer types and invariants.

pub mod locator;
pub mod parts;
