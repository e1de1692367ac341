//! Palma Core - Shared types library.
//!
//! This crate provides common types used across all Palma components:
//! - `storefront` - Cart reconciliation, catalog and checkout services
//! - `cli` - Command-line tools for migrations and cart management
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O, no
//! database access, no async. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, identities, cart lines and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
