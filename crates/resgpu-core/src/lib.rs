//! resgpu-core: Core types for the resgpu resource plugin
//!
//! This crate provides the fundamental types used throughout resgpu:
//! - Product ledgers and node/workload resource shapes
//! - Engine params and host engine info
//! - Configuration types
//! - Error handling

pub mod config;
pub mod engine;
pub mod error;
pub mod resource;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use resource::*;
