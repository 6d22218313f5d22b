//! Kitforge core library exports
//!
//! Keeps a catalog of generated UI components consistent with the file
//! registry derived from it (per-component sources, a shared export index and
//! a JSON manifest).

pub mod catalog;
pub mod component;
pub mod config;
pub mod error;
pub mod naming;
pub mod rate_limit;
pub mod registry;
pub mod service;

pub use error::{KitforgeError, Result};
