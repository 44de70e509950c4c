//! Contributor swag core - shared domain types.
//!
//! This crate provides the types used across the contributor swag components:
//! - `api` - HTTP service that verifies GitHub contributors and provisions
//!   discount-eligible Shopify customers
//! - `cli` - Command-line tools for migrations and the legacy contributor import
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The discount tier calculator lives here because it
//! is a pure function of the contribution count.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for usernames, emails, customer IDs, plus the
//!   GitHub, discount and contributor value types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
