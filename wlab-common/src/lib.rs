//! # WLAB Common Library
//!
//! Shared code for the WLAB labeling services:
//! - Error type used by storage and configuration code
//! - Service configuration resolution (CLI / ENV / TOML / defaults)
//! - SQLite schema initialization

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
