//! Shared types for the greenpath routing engine.
//!
//! Typed errors live here so that both the engine library and any outer
//! service layer can match on failure kinds without depending on each
//! other. Application binaries wrap these in `anyhow` context chains at
//! the boundary.

pub mod error;

pub use error::{Result, RouteError};
