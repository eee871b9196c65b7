//! Common utilities for the isoline toolkit

pub mod error;

pub use error::{find_best_fuzzy_match, Error, Result};
