//! # Veil
//!
//! Facade over the Veil workspace crates:
//!
//! - [`veil_crypto`]: secret reveal, key derivation, name cipher, block layout
//! - [`veil_storage`]: storage drivers and the mount table
//! - [`veil_core`]: chain resolution, delivery policy and metadata assembly
//! - [`veil_gateway`]: the HTTP surface

pub use veil_core;
pub use veil_crypto;
pub use veil_gateway;
pub use veil_storage;
