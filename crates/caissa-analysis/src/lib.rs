//! Analytics computations for Caissa.
//!
//! Pure derivations (normalization, summaries, aggregate maths, diagnostic
//! flags, gold-set scoring) plus thin orchestration functions generic over
//! any [`caissa_core::store::AnalyticsStore`]. This crate performs no I/O
//! of its own and knows nothing about HTTP or SQLite.

pub mod aggregates;
pub mod diagnostics;
pub mod error;
pub mod goldset;
pub mod ingest;
pub mod normalize;
pub mod retention;
pub mod summary;

pub use error::{Error, Result};
