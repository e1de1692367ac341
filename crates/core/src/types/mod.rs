//! Core types for Palma.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod identity;
pub mod price;
pub mod status;

pub use cart::{CartLine, CartSnapshot, LineDetails, QuantityChange};
pub use id::*;
pub use identity::{Identity, IdentityId, IdentityIdError};
pub use price::{CurrencyCode, Price};
pub use status::*;
