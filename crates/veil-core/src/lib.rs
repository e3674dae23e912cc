//! # Veil Core
//!
//! Resolution core of the Veil metadata gateway.
//!
//! This crate provides:
//! - **Directory lookups**: listings across the mount table
//! - **Storage chains**: following re-routing storages to the physical one
//! - **Proxy policy**: choosing between download proxies, the local proxy
//!   and direct backend links
//! - **Metadata assembly**: the crypt metadata of a single file
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          MetadataAssembler              │
//! ├──────────────┬──────────────┬───────────┤
//! │   fs lookup  │ chain        │ delivery  │
//! ├──────────────┴──────────────┴───────────┤
//! │       veil-storage MountTable           │
//! └─────────────────────────────────────────┘
//! ```

pub mod chain;
pub mod delivery;
pub mod error;
pub mod fs;
pub mod meta;

pub use chain::{resolve_chain, ChainNode, MAX_CHAIN_DEPTH};
pub use delivery::{decide_delivery, Delivery, ProxyPolicy, MAX_DIRECT_CONCURRENCY};
pub use error::{CoreError, Result};
pub use meta::{MetadataAssembler, Mode, RemoteInfo, ResolvedMetadata};
