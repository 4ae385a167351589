//! # Royalty Common Library
//!
//! Shared code for the royalty services:
//! - Error and result types
//! - Decimal amount helpers
//! - Configuration loading and root folder resolution
//! - Shared tables (release catalog, balances, audit transactions, settings)

pub mod amount;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
