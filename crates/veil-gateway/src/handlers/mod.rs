//! HTTP request handlers

pub mod fs;
pub mod service;

pub use fs::*;
pub use service::*;
