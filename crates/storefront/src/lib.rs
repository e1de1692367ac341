//! Palma Storefront library.
//!
//! Keeps a shopper's cart consistent across sessions and devices:
//!
//! - [`cart`] - the reconciliation service and its store seams
//! - [`catalog`] - product lookups, with a `moka` cache in front
//! - [`identity`] - who is signed in, and change notifications
//! - [`checkout`] - turning a signed-in cart into an order
//! - [`db`] - `PostgreSQL` adapters and migrations
//! - [`state`] - everything wired together for one session

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod state;
pub mod telemetry;
