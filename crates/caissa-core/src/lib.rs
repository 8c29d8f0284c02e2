//! Core types and trait definitions for the Caissa analytics pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod aggregate;
pub mod error;
pub mod fact;
pub mod game;
pub mod goldcase;
pub mod interaction;
pub mod store;
pub mod trace;

pub use error::{Error, Result};
